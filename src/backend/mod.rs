//! The graphics-context interface the batch renderer draws through.
//!
//! [`RenderBackend`] is deliberately small: buffer management, a handful of state
//! setters and a non-indexed draw. The renderer decides what to call and when;
//! a backend only executes.

pub mod recording;
pub mod gpu;

pub use self::recording::{BackendCommand, RecordedDraw, RecordingBackend};
pub use self::gpu::WgpuBackend;

use crate::error::BackendError;
use crate::id::{BufferHandle, ShaderId, TextureId};
use crate::lighting::LightingUniform;
use crate::math::Mat4;
use crate::shape::ExternalBuffer;
use crate::vertex::Vertex;

/// Shaders every backend is expected to provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderSlot {
    /// Unlit triangles, optionally textured.
    Fill,
    /// Lit triangles.
    Light,
    /// Native lines.
    Line,
    /// Native points.
    Point,
}

impl ShaderSlot {
    pub const ALL: [ShaderSlot; 4] = [
        ShaderSlot::Fill,
        ShaderSlot::Light,
        ShaderSlot::Line,
        ShaderSlot::Point,
    ];
}

/// The shader a draw runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderBinding {
    Builtin(ShaderSlot),
    Custom(ShaderId),
}

/// Primitive assembly of a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Triangles,
    Lines,
    Points,
}

/// Blend and depth-write configuration. Depth testing is always on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassState {
    pub blend: bool,
    pub depth_write: bool,
}

impl PassState {
    pub const OPAQUE: PassState = PassState {
        blend: false,
        depth_write: true,
    };
    pub const TRANSPARENT: PassState = PassState {
        blend: true,
        depth_write: false,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Model matrices a single transform upload can hold.
    pub max_transforms: usize,
    pub native_lines: bool,
    pub native_points: bool,
    /// Largest vertex buffer the backend can allocate, in vertices.
    pub max_vertices: usize,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_transforms: 256,
            native_lines: true,
            native_points: true,
            max_vertices: 1 << 24,
        }
    }
}

/// Graphics-context provider.
///
/// State set through the `bind_*`/`set_*`/`upload_*` methods applies to every
/// following [`draw`](RenderBackend::draw) until changed. Draw-time methods do not
/// fail: a backend that cannot honour a call logs it and draws with what it has.
pub trait RenderBackend {
    fn capabilities(&self) -> Capabilities;

    fn compile_builtin_shader(&mut self, slot: ShaderSlot) -> Result<(), BackendError>;

    /// Allocates a vertex buffer holding `capacity` vertices.
    fn create_vertex_buffer(&mut self, capacity: usize) -> Result<BufferHandle, BackendError>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Writes `vertices` starting at vertex `first_vertex` of `buffer`.
    fn write_vertices(&mut self, buffer: BufferHandle, first_vertex: usize, vertices: &[Vertex]);

    fn set_view_projection(&mut self, view_projection: &Mat4);

    fn bind_shader(&mut self, shader: ShaderBinding);

    /// `None` binds the backend's plain white texture.
    fn bind_texture(&mut self, texture: Option<TextureId>);

    fn set_pass_state(&mut self, state: PassState);

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle);

    /// Replaces the model matrix table; vertices select a row by `transform_index`.
    fn upload_transforms(&mut self, transforms: &[Mat4]);

    fn upload_lighting(&mut self, lighting: &LightingUniform);

    fn draw(&mut self, primitive: PrimitiveKind, first_vertex: u32, vertex_count: u32);
}

/// Copies `vertices` into a new backend buffer that outlives frames, for drawing
/// with [`crate::Canvas::mesh`]. The caller owns the buffer and destroys it with
/// [`RenderBackend::destroy_buffer`].
pub fn upload_mesh<B: RenderBackend + ?Sized>(
    backend: &mut B,
    vertices: &[Vertex],
) -> Result<ExternalBuffer, BackendError> {
    let buffer = backend.create_vertex_buffer(vertices.len())?;
    backend.write_vertices(buffer, 0, vertices);
    Ok(ExternalBuffer {
        buffer,
        first_vertex: 0,
        vertex_count: vertices.len() as u32,
    })
}
