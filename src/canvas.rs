//! Immediate-mode drawing surface.
//!
//! A [`Canvas`] keeps the current style, transform and lighting, and turns every
//! drawing call into [`ShapeRecord`]s submitted to a [`ShapeSink`], usually the
//! [`FrameAccumulator`] the renderer flushes at the end of the frame. A shape with
//! both a fill and a stroke becomes two records: the interior first, then the
//! outline.
//!
//! # Examples
//!
//! ```rust
//! use tessera::{Canvas, Color, Topology};
//!
//! let mut canvas = Canvas::new();
//! canvas.fill(Color::rgb(200, 40, 40));
//! canvas.no_stroke();
//!
//! canvas.push();
//! canvas.translate(10.0, 0.0, 0.0);
//! canvas.begin_shape(Topology::Polygon);
//! canvas.vertex(0.0, 0.0, 0.0);
//! canvas.vertex(4.0, 0.0, 0.0);
//! canvas.vertex(4.0, 4.0, 0.0);
//! canvas.vertex(2.0, 2.0, 0.0);
//! canvas.vertex(0.0, 4.0, 0.0);
//! canvas.end_shape(true);
//! canvas.pop();
//!
//! assert_eq!(canvas.sink().len(), 1);
//! assert_eq!(canvas.sink().records()[0].vertices().len(), 5);
//! ```

use crate::accumulator::{FrameAccumulator, ShapeSink};
use crate::color::Color;
use crate::id::{ShaderId, TextureId};
use crate::lighting::{Light, LightingSnapshot};
use crate::math::{rotation_x, rotation_y, rotation_z, Mat4, Point3, Vec3};
use crate::shape::{ExternalBuffer, ShapeRecord, ShapeRecordBuilder, ShapeStyle, Topology};
use crate::stroke::{StrokeAttributes, StrokeCap, StrokeJoin};
use crate::text::{GlyphProvider, GlyphQuad};
use crate::vertex::Vertex;
use crate::warn_once::WarnOnce;

/// Style state saved by [`Canvas::push`].
#[derive(Clone, Debug, PartialEq)]
struct Style {
    fill: Option<Color>,
    stroke: Option<Color>,
    stroke_attributes: StrokeAttributes,
    texture: Option<TextureId>,
    shader: Option<ShaderId>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Some(Color::WHITE),
            stroke: Some(Color::BLACK),
            stroke_attributes: StrokeAttributes::default(),
            texture: None,
            shader: None,
        }
    }
}

/// Vertices of the shape between `begin_shape` and `end_shape`. Fill and stroke
/// colors are captured per vertex.
#[derive(Debug)]
struct OpenShape {
    topology: Topology,
    fill: Vec<Vertex>,
    stroke: Vec<Color>,
}

#[derive(Debug)]
pub struct Canvas<S: ShapeSink = FrameAccumulator> {
    sink: S,
    style: Style,
    matrix: Mat4,
    stack: Vec<(Mat4, Style)>,
    normal: [f32; 3],
    lighting: Option<LightingSnapshot>,
    open: Option<OpenShape>,
    warnings: WarnOnce,
}

impl Canvas<FrameAccumulator> {
    pub fn new() -> Self {
        Self::with_sink(FrameAccumulator::new())
    }
}

impl Default for Canvas<FrameAccumulator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ShapeSink> Canvas<S> {
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            style: Style::default(),
            matrix: Mat4::identity(),
            stack: Vec::new(),
            normal: [0.0, 0.0, 1.0],
            lighting: None,
            open: None,
            warnings: WarnOnce::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Resets the transform, the matrix stack and lighting. Style carries over
    /// between frames.
    pub fn begin_frame(&mut self) {
        if self.open.take().is_some() {
            self.warnings.warn(
                "unfinished-shape",
                format_args!("Shape left open at the end of a frame was discarded"),
            );
        }
        self.matrix = Mat4::identity();
        self.stack.clear();
        self.lighting = None;
    }

    // Style

    pub fn fill(&mut self, color: Color) {
        self.style.fill = Some(color);
    }

    pub fn no_fill(&mut self) {
        self.style.fill = None;
    }

    pub fn stroke(&mut self, color: Color) {
        self.style.stroke = Some(color);
    }

    pub fn no_stroke(&mut self) {
        self.style.stroke = None;
    }

    pub fn stroke_weight(&mut self, weight: f32) {
        self.style.stroke_attributes.weight = weight;
    }

    pub fn stroke_join(&mut self, join: StrokeJoin) {
        self.style.stroke_attributes.join = join;
    }

    pub fn stroke_cap(&mut self, cap: StrokeCap) {
        self.style.stroke_attributes.cap = cap;
    }

    pub fn stroke_attributes(&mut self, attributes: StrokeAttributes) {
        self.style.stroke_attributes = attributes;
    }

    /// Textures every following filled shape, using the vertices' texture
    /// coordinates. Textured shapes are always drawn in the transparent pass.
    pub fn texture(&mut self, texture: TextureId) {
        self.style.texture = Some(texture);
    }

    pub fn no_texture(&mut self) {
        self.style.texture = None;
    }

    pub fn shader(&mut self, shader: ShaderId) {
        self.style.shader = Some(shader);
    }

    pub fn reset_shader(&mut self) {
        self.style.shader = None;
    }

    // Transform

    /// Saves the current transform and style.
    pub fn push(&mut self) {
        self.stack.push((self.matrix, self.style.clone()));
    }

    /// Restores the transform and style saved by the matching [`Canvas::push`].
    pub fn pop(&mut self) {
        match self.stack.pop() {
            Some((matrix, style)) => {
                self.matrix = matrix;
                self.style = style;
            }
            None => {
                self.warnings.warn(
                    "matrix-stack-underflow",
                    format_args!("pop() without a matching push() was ignored"),
                );
            }
        }
    }

    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    pub fn reset_matrix(&mut self) {
        self.matrix = Mat4::identity();
    }

    /// Applies `matrix` in the current object space, before the existing transform.
    pub fn apply_matrix(&mut self, matrix: &Mat4) {
        self.matrix = matrix.then(&self.matrix);
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.apply_matrix(&Mat4::translation(x, y, z));
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.apply_matrix(&Mat4::scale(x, y, z));
    }

    pub fn rotate_x(&mut self, radians: f32) {
        self.apply_matrix(&rotation_x(radians));
    }

    pub fn rotate_y(&mut self, radians: f32) {
        self.apply_matrix(&rotation_y(radians));
    }

    /// Rotation in the XY plane.
    pub fn rotate(&mut self, radians: f32) {
        self.apply_matrix(&rotation_z(radians));
    }

    // Lighting

    /// Enables lighting with a gray ambient light and a gray directional light
    /// shining down the view axis.
    pub fn lights(&mut self) {
        self.ambient_light(Color::gray(128));
        self.directional_light(Color::gray(128), [0.0, 0.0, -1.0]);
    }

    pub fn no_lights(&mut self) {
        self.lighting = None;
    }

    pub fn ambient_light(&mut self, color: Color) {
        self.add_light(Light::ambient(rgb(color)));
    }

    /// `direction` is in the current object space.
    pub fn directional_light(&mut self, color: Color, direction: [f32; 3]) {
        let direction = self.world_direction(direction);
        self.add_light(Light::directional(rgb(color), direction));
    }

    /// `position` is in the current object space.
    pub fn point_light(&mut self, color: Color, position: [f32; 3]) {
        let position = self.world_position(position);
        self.add_light(Light::point(rgb(color), position));
    }

    pub fn spot_light(
        &mut self,
        color: Color,
        position: [f32; 3],
        direction: [f32; 3],
        angle: f32,
        concentration: f32,
    ) {
        let position = self.world_position(position);
        let direction = self.world_direction(direction);
        self.add_light(Light::spot(rgb(color), position, direction, angle, concentration));
    }

    /// Adds a fully configured light, given in world space.
    pub fn add_light(&mut self, light: Light) {
        let lighting = self.lighting.get_or_insert_with(LightingSnapshot::new);
        if !lighting.push(light) {
            self.warnings.warn(
                "too-many-lights",
                format_args!("Light limit reached; extra lights are ignored"),
            );
        }
    }

    pub fn is_lighting_enabled(&self) -> bool {
        self.lighting.is_some()
    }

    fn world_position(&self, position: [f32; 3]) -> [f32; 3] {
        self.matrix
            .transform_point3d(Point3::new(position[0], position[1], position[2]))
            .map(|point| point.to_array())
            .unwrap_or(position)
    }

    fn world_direction(&self, direction: [f32; 3]) -> [f32; 3] {
        self.matrix
            .transform_vector3d(Vec3::new(direction[0], direction[1], direction[2]))
            .to_array()
    }

    // Shapes

    /// Normal used by the following vertices.
    pub fn normal(&mut self, x: f32, y: f32, z: f32) {
        self.normal = [x, y, z];
    }

    pub fn begin_shape(&mut self, topology: Topology) {
        if self.open.is_some() {
            self.warnings.warn(
                "nested-begin-shape",
                format_args!("begin_shape() inside an open shape discards the open shape"),
            );
        }
        self.open = Some(OpenShape {
            topology,
            fill: Vec::new(),
            stroke: Vec::new(),
        });
    }

    pub fn vertex(&mut self, x: f32, y: f32, z: f32) {
        self.vertex_uv(x, y, z, 0.0, 0.0);
    }

    pub fn vertex_uv(&mut self, x: f32, y: f32, z: f32, u: f32, v: f32) {
        let fill = self.style.fill.unwrap_or(Color::TRANSPARENT);
        let stroke = self.style.stroke.unwrap_or(Color::TRANSPARENT);
        let normal = self.normal;
        let Some(open) = self.open.as_mut() else {
            self.warnings.warn(
                "vertex-outside-shape",
                format_args!("vertex() outside begin_shape()/end_shape() was ignored"),
            );
            return;
        };
        open.fill.push(
            Vertex::new([x, y, z], fill)
                .with_normal(normal)
                .with_tex_coords([u, v]),
        );
        open.stroke.push(stroke);
    }

    /// Finishes the open shape. `close` joins the outline's last vertex to its first.
    pub fn end_shape(&mut self, close: bool) {
        let Some(open) = self.open.take() else {
            self.warnings.warn(
                "end-without-begin",
                format_args!("end_shape() without begin_shape() was ignored"),
            );
            return;
        };
        self.emit(open.topology, open.fill, &open.stroke, close);
    }

    /// Submits the interior and outline records of a finished vertex list.
    fn emit(&mut self, topology: Topology, vertices: Vec<Vertex>, stroke: &[Color], close: bool) {
        if vertices.is_empty() {
            return;
        }

        let outline = match self.style.stroke {
            Some(_) if !self.style.stroke_attributes.is_empty() => Some(
                vertices
                    .iter()
                    .zip(stroke)
                    .map(|(vertex, color)| vertex.with_color(color.normalize()))
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        };

        if self.style.fill.is_some() && topology.is_fillable() {
            let record = self
                .record(topology, vertices, ShapeStyle::Fill)
                .closed(close)
                .build();
            self.sink.submit(record);
        }
        if let Some(outline) = outline {
            let record = self
                .record(
                    topology,
                    outline,
                    ShapeStyle::Stroke(self.style.stroke_attributes),
                )
                .texture(None)
                .lighting(None)
                .closed(close)
                .build();
            self.sink.submit(record);
        }
    }

    /// Builds a shape from positions with the current fill and stroke.
    fn emit_positions(&mut self, topology: Topology, corners: &[([f32; 3], [f32; 2])], close: bool) {
        let fill = self.style.fill.unwrap_or(Color::TRANSPARENT);
        let stroke = self.style.stroke.unwrap_or(Color::TRANSPARENT);
        let vertices = corners
            .iter()
            .map(|&(position, uv)| {
                Vertex::new(position, fill)
                    .with_normal(self.normal)
                    .with_tex_coords(uv)
            })
            .collect();
        let colors = vec![stroke; corners.len()];
        self.emit(topology, vertices, &colors, close);
    }

    pub fn point(&mut self, x: f32, y: f32, z: f32) {
        self.emit_positions(Topology::Points, &[([x, y, z], [0.0; 2])], false);
    }

    pub fn line(&mut self, from: [f32; 3], to: [f32; 3]) {
        self.emit_positions(Topology::Lines, &[(from, [0.0; 2]), (to, [0.0; 2])], false);
    }

    pub fn triangle(&mut self, a: [f32; 3], b: [f32; 3], c: [f32; 3]) {
        self.emit_positions(
            Topology::Triangles,
            &[(a, [0.0, 0.0]), (b, [1.0, 0.0]), (c, [0.5, 1.0])],
            true,
        );
    }

    pub fn quad(&mut self, a: [f32; 3], b: [f32; 3], c: [f32; 3], d: [f32; 3]) {
        self.emit_positions(
            Topology::Quads,
            &[(a, [0.0, 0.0]), (b, [1.0, 0.0]), (c, [1.0, 1.0]), (d, [0.0, 1.0])],
            true,
        );
    }

    /// Axis-aligned rectangle in the z = 0 plane, texture coordinates spanning 0..1.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.quad(
            [x, y, 0.0],
            [x + width, y, 0.0],
            [x + width, y + height, 0.0],
            [x, y + height, 0.0],
        );
    }

    /// Closed, possibly concave outline.
    pub fn polygon(&mut self, points: &[[f32; 3]]) {
        let corners: Vec<_> = points.iter().map(|&point| (point, [0.0; 2])).collect();
        self.emit_positions(Topology::Polygon, &corners, true);
    }

    /// Draws `texture` on a rectangle without outline.
    pub fn image(&mut self, texture: TextureId, x: f32, y: f32, width: f32, height: f32) {
        let saved = self.style.clone();
        self.style.texture = Some(texture);
        self.style.stroke = None;
        self.style.fill = Some(saved.fill.unwrap_or(Color::WHITE));
        self.rect(x, y, width, height);
        self.style = saved;
    }

    /// Draws a caller-owned vertex buffer with the current transform, texture,
    /// lighting and shader. The buffer is not tessellated, so `topology` only
    /// selects the primitive kind.
    pub fn mesh(&mut self, buffer: ExternalBuffer, topology: Topology) {
        let record = ShapeRecord::builder(topology)
            .external_buffer(buffer)
            .model_matrix(self.matrix)
            .texture(self.style.texture)
            .lighting(self.lighting.clone())
            .custom_shader(self.style.shader)
            .build();
        self.sink.submit(record);
    }

    /// Lays out `text` with `font` and submits the glyphs as one textured
    /// `Quads` shape in the fill color.
    pub fn text<G: GlyphProvider + ?Sized>(&mut self, font: &G, text: &str, x: f32, y: f32, size: f32) {
        let Some(fill) = self.style.fill else {
            return;
        };
        let mut quads: Vec<GlyphQuad> = Vec::new();
        font.append_glyph_quads(text, [x, y], size, &mut quads);
        if quads.is_empty() {
            return;
        }

        let vertices = quads
            .iter()
            .flat_map(GlyphQuad::corners)
            .map(|(position, uv)| {
                Vertex::new([position[0], position[1], 0.0], fill)
                    .with_normal(self.normal)
                    .with_tex_coords(uv)
            });
        let record = ShapeRecord::builder(Topology::Quads)
            .vertices(vertices)
            .model_matrix(self.matrix)
            .texture(Some(font.atlas()))
            .lighting(self.lighting.clone())
            .custom_shader(self.style.shader)
            .build();
        self.sink.submit(record);
    }

    fn record(&self, topology: Topology, vertices: Vec<Vertex>, style: ShapeStyle) -> ShapeRecordBuilder {
        ShapeRecord::builder(topology)
            .vertices(vertices)
            .style(style)
            .model_matrix(self.matrix)
            .texture(self.style.texture)
            .lighting(self.lighting.clone())
            .custom_shader(self.style.shader)
    }
}

fn rgb(color: Color) -> [f32; 3] {
    let [r, g, b, _] = color.normalize();
    [r, g, b]
}
