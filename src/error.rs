use thiserror::Error;

use crate::backend::ShaderSlot;
use crate::id::{BufferHandle, ShaderId, TextureId};

/// Failures reported by a [`RenderBackend`](crate::backend::RenderBackend).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("builtin {0:?} shader failed to compile: {1}")]
    BuiltinShader(ShaderSlot, String),

    #[error("shader failed to compile: {0}")]
    ShaderCompilation(String),

    #[error("failed to allocate a vertex buffer of {0} bytes")]
    BufferAllocation(u64),

    #[error("unknown texture {0}")]
    UnknownTexture(TextureId),

    #[error("unknown shader {0}")]
    UnknownShader(ShaderId),

    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferHandle),

    #[error("texture data is {actual} bytes, expected {expected} for the given size")]
    TextureSize { expected: usize, actual: usize },
}

/// Fatal setup failures. Nothing during submission or flushing returns this.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),

    #[error("failed to request a GPU device: {0}")]
    Device(String),
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
