//! The `shape` module defines [`ShapeRecord`], the unit the drawing API submits and the
//! renderer consumes at the end of a frame.
//!
//! # Examples
//!
//! ```rust
//! use tessera::{Color, ShapeRecord, Topology, Vertex};
//!
//! let red = Color::rgb(255, 0, 0);
//! let quad = ShapeRecord::builder(Topology::Quads)
//!     .vertices([
//!         Vertex::new([0.0, 0.0, 0.0], red),
//!         Vertex::new([1.0, 0.0, 0.0], red),
//!         Vertex::new([1.0, 1.0, 0.0], red),
//!         Vertex::new([0.0, 1.0, 0.0], red),
//!     ])
//!     .build();
//!
//! assert!(quad.is_filled());
//! assert!(!quad.is_transparent());
//! ```

use crate::id::{BufferHandle, ShaderId, TextureId};
use crate::lighting::LightingSnapshot;
use crate::math::Mat4;
use crate::stroke::StrokeAttributes;
use crate::vertex::Vertex;

/// Primitive topology of a submitted vertex list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
    Polygon,
}

impl Topology {
    /// Topologies whose interior can be filled.
    pub fn is_fillable(self) -> bool {
        !matches!(self, Topology::Points | Topology::Lines | Topology::LineStrip)
    }
}

/// Whether a record is a triangulated interior or an outline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeStyle {
    Fill,
    Stroke(StrokeAttributes),
}

/// A caller-built GPU vertex buffer drawn as-is, without tessellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExternalBuffer {
    pub buffer: BufferHandle,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

/// One drawable unit submitted during a frame.
///
/// All fields are fixed once the record is built; `transparent` is derived by the
/// builder from the vertex alphas and the bound texture.
#[derive(Clone, Debug)]
pub struct ShapeRecord {
    topology: Topology,
    vertices: Vec<Vertex>,
    style: ShapeStyle,
    model_matrix: Mat4,
    transparent: bool,
    closed: bool,
    texture: Option<TextureId>,
    lighting: Option<LightingSnapshot>,
    custom_shader: Option<ShaderId>,
    external_buffer: Option<ExternalBuffer>,
}

impl ShapeRecord {
    pub fn builder(topology: Topology) -> ShapeRecordBuilder {
        ShapeRecordBuilder::new(topology)
    }

    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        matches!(self.style, ShapeStyle::Fill)
    }

    #[inline]
    pub fn stroke_attributes(&self) -> Option<&StrokeAttributes> {
        match &self.style {
            ShapeStyle::Fill => None,
            ShapeStyle::Stroke(attributes) => Some(attributes),
        }
    }

    #[inline]
    pub fn model_matrix(&self) -> &Mat4 {
        &self.model_matrix
    }

    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    #[inline]
    pub fn is_light_enabled(&self) -> bool {
        self.lighting.is_some()
    }

    #[inline]
    pub fn lighting(&self) -> Option<&LightingSnapshot> {
        self.lighting.as_ref()
    }

    #[inline]
    pub fn custom_shader(&self) -> Option<ShaderId> {
        self.custom_shader
    }

    #[inline]
    pub fn external_buffer(&self) -> Option<&ExternalBuffer> {
        self.external_buffer.as_ref()
    }

    /// Object-space center used for back-to-front sorting.
    pub fn center_object_space(&self, strategy: CenterStrategy) -> [f32; 3] {
        match strategy {
            CenterStrategy::Origin => [0.0; 3],
            _ if self.vertices.is_empty() => [0.0; 3],
            CenterStrategy::BoundingBox => {
                let mut min = [f32::INFINITY; 3];
                let mut max = [f32::NEG_INFINITY; 3];
                for vertex in &self.vertices {
                    for axis in 0..3 {
                        min[axis] = min[axis].min(vertex.position[axis]);
                        max[axis] = max[axis].max(vertex.position[axis]);
                    }
                }
                [
                    (min[0] + max[0]) * 0.5,
                    (min[1] + max[1]) * 0.5,
                    (min[2] + max[2]) * 0.5,
                ]
            }
            CenterStrategy::CenterOfMass => {
                let mut sum = [0.0f32; 3];
                for vertex in &self.vertices {
                    sum[0] += vertex.position[0];
                    sum[1] += vertex.position[1];
                    sum[2] += vertex.position[2];
                }
                let count = self.vertices.len() as f32;
                [sum[0] / count, sum[1] / count, sum[2] / count]
            }
        }
    }
}

/// How the object-space center of a transparent shape is chosen for depth sorting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CenterStrategy {
    /// Center of the axis-aligned bounding box of the vertices.
    #[default]
    BoundingBox,
    /// Mean of the vertex positions.
    CenterOfMass,
    /// Object-space origin; sorting then follows the model matrix translation only.
    Origin,
}

/// Builder for [`ShapeRecord`]. Fill is the default style.
#[derive(Clone, Debug)]
pub struct ShapeRecordBuilder {
    topology: Topology,
    vertices: Vec<Vertex>,
    style: ShapeStyle,
    model_matrix: Mat4,
    closed: bool,
    texture: Option<TextureId>,
    lighting: Option<LightingSnapshot>,
    custom_shader: Option<ShaderId>,
    external_buffer: Option<ExternalBuffer>,
}

impl ShapeRecordBuilder {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            vertices: Vec::new(),
            style: ShapeStyle::Fill,
            model_matrix: Mat4::identity(),
            closed: false,
            texture: None,
            lighting: None,
            custom_shader: None,
            external_buffer: None,
        }
    }

    pub fn vertices(mut self, vertices: impl IntoIterator<Item = Vertex>) -> Self {
        self.vertices = vertices.into_iter().collect();
        self
    }

    pub fn push_vertex(mut self, vertex: Vertex) -> Self {
        self.vertices.push(vertex);
        self
    }

    pub fn fill(mut self) -> Self {
        self.style = ShapeStyle::Fill;
        self
    }

    pub fn stroke(mut self, attributes: StrokeAttributes) -> Self {
        self.style = ShapeStyle::Stroke(attributes);
        self
    }

    pub fn style(mut self, style: ShapeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn model_matrix(mut self, matrix: Mat4) -> Self {
        self.model_matrix = matrix;
        self
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = closed;
        self
    }

    pub fn texture(mut self, texture: Option<TextureId>) -> Self {
        self.texture = texture;
        self
    }

    pub fn lighting(mut self, lighting: Option<LightingSnapshot>) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn custom_shader(mut self, shader: Option<ShaderId>) -> Self {
        self.custom_shader = shader;
        self
    }

    pub fn external_buffer(mut self, buffer: ExternalBuffer) -> Self {
        self.external_buffer = Some(buffer);
        self
    }

    pub fn build(self) -> ShapeRecord {
        let transparent =
            self.texture.is_some() || self.vertices.iter().any(|vertex| vertex.alpha() < 1.0);

        ShapeRecord {
            topology: self.topology,
            vertices: self.vertices,
            style: self.style,
            model_matrix: self.model_matrix,
            transparent,
            closed: self.closed,
            texture: self.texture,
            lighting: self.lighting,
            custom_shader: self.custom_shader,
            external_buffer: self.external_buffer,
        }
    }
}

impl From<ShapeRecordBuilder> for ShapeRecord {
    fn from(value: ShapeRecordBuilder) -> Self {
        value.build()
    }
}
