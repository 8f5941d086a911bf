use std::ops::Range;

use ahash::HashMap;

use crate::backend::{PassState, PrimitiveKind, ShaderBinding};
use crate::id::TextureId;
use crate::math::Mat4;
use crate::shape::{ExternalBuffer, ShapeRecord};
use crate::vertex::Vertex;

/// Pass a shape is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeClass {
    Opaque,
    Light,
    Transparent,
}

impl ShapeClass {
    pub fn of(record: &ShapeRecord) -> Self {
        if record.is_transparent() {
            ShapeClass::Transparent
        } else if record.is_light_enabled() {
            ShapeClass::Light
        } else {
            ShapeClass::Opaque
        }
    }

    pub fn pass_state(self) -> PassState {
        match self {
            ShapeClass::Opaque | ShapeClass::Light => PassState::OPAQUE,
            ShapeClass::Transparent => PassState::TRANSPARENT,
        }
    }
}

/// Shapes sharing a key can be drawn from one chunk without state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct BatchKey {
    pub(super) texture: Option<TextureId>,
    pub(super) shader: ShaderBinding,
    pub(super) primitive: PrimitiveKind,
}

/// Native lines and points go after the triangles of their pass.
pub(super) fn primitive_rank(primitive: PrimitiveKind) -> u8 {
    match primitive {
        PrimitiveKind::Triangles => 0,
        PrimitiveKind::Lines => 1,
        PrimitiveKind::Points => 2,
    }
}

#[derive(Debug, Clone)]
pub(super) enum ShapeSource {
    /// Range in [`PreparedFrame::vertices`].
    Stream(Range<usize>),
    External(ExternalBuffer),
}

#[derive(Debug, Clone)]
pub(super) struct PreparedShape {
    /// Index of the record in the accumulator.
    pub(super) record: usize,
    pub(super) class: ShapeClass,
    pub(super) key: BatchKey,
    pub(super) source: ShapeSource,
    /// First-appearance rank of `key`.
    pub(super) group: usize,
    /// Projected depth of the center; only computed for transparent shapes.
    pub(super) depth: f32,
    /// Whether the lighting snapshot must be resident when drawing.
    pub(super) uses_lighting: bool,
}

#[derive(Debug, Clone)]
pub(super) struct Batch {
    pub(super) key: BatchKey,
    pub(super) class: ShapeClass,
    /// Range in [`PreparedFrame::order`].
    pub(super) shapes: Range<usize>,
}

/// Per-flush scratch, kept across frames for its allocations.
#[derive(Debug, Default)]
pub(super) struct PreparedFrame {
    pub(super) vertices: Vec<Vertex>,
    pub(super) shapes: Vec<PreparedShape>,
    /// First-appearance rank of every batch key.
    pub(super) groups: HashMap<BatchKey, usize>,
    pub(super) order: Vec<usize>,
    pub(super) batches: Vec<Batch>,
}

impl PreparedFrame {
    pub(super) fn clear(&mut self) {
        self.vertices.clear();
        self.shapes.clear();
        self.groups.clear();
        self.order.clear();
        self.batches.clear();
    }
}

#[derive(Debug, Default)]
pub(super) struct ChunkScratch {
    pub(super) members: Vec<usize>,
    pub(super) vertices: Vec<Vertex>,
    pub(super) transforms: Vec<Mat4>,
}

impl ChunkScratch {
    pub(super) fn clear(&mut self) {
        self.members.clear();
        self.vertices.clear();
        self.transforms.clear();
    }
}
