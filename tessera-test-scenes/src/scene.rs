use tessera::backend::{ShaderBinding, ShaderSlot};
use tessera::math::orthographic;
use tessera::{Canvas, Color, GlyphProvider, GridFont, Mat4, StrokeJoin, TextureId};

use crate::expectations::DrawExpectation;

// ── Grid layout constants ────────────────────────────────────────────────────

const TILE_SIZE: u32 = 80;
const COLUMNS: u32 = 4;
const ROWS: u32 = 2;

pub const CANVAS_WIDTH: u32 = TILE_SIZE * COLUMNS;
pub const CANVAS_HEIGHT: u32 = TILE_SIZE * ROWS;

/// Glyph atlas layout: printable ASCII, sixteen cells per row.
const FONT_COLUMNS: u32 = 16;
const FONT_ROWS: u32 = 6;

const FILL: ShaderBinding = ShaderBinding::Builtin(ShaderSlot::Fill);
const LIGHT: ShaderBinding = ShaderBinding::Builtin(ShaderSlot::Light);

/// Textures the scene draws with. Backends register them however they store
/// textures; the recording backend accepts any id.
pub struct SceneResources {
    pub checkerboard: TextureId,
    pub font: GridFont,
}

impl SceneResources {
    pub fn new(checkerboard: TextureId, font_atlas: TextureId) -> Self {
        Self {
            checkerboard,
            font: GridFont::new(font_atlas, FONT_COLUMNS, FONT_ROWS, ' '),
        }
    }

    pub fn font_atlas(&self) -> TextureId {
        self.font.atlas()
    }
}

/// 4×4 checkerboard: alternating white and black pixels, RGBA.
pub fn checkerboard_rgba() -> Vec<u8> {
    let mut pixels = vec![0u8; 4 * 4 * 4];
    for row in 0..4u32 {
        for col in 0..4u32 {
            let value = if (row + col) % 2 == 0 { 255 } else { 0 };
            let offset = ((row * 4 + col) * 4) as usize;
            pixels[offset..offset + 3].fill(value);
            pixels[offset + 3] = 255;
        }
    }
    pixels
}

/// One white pixel per glyph cell; enough to see where text lands.
pub fn font_atlas_rgba() -> (Vec<u8>, (u32, u32)) {
    (
        vec![255u8; (FONT_COLUMNS * FONT_ROWS * 4) as usize],
        (FONT_COLUMNS, FONT_ROWS),
    )
}

/// Pixel-space orthographic projection with the origin at the top-left corner.
pub fn canvas_projection() -> Mat4 {
    orthographic(
        0.0,
        CANVAS_WIDTH as f32,
        CANVAS_HEIGHT as f32,
        0.0,
        -100.0,
        100.0,
    )
}

/// Returns the pixel origin (top-left corner) of tile number `n` (1-based).
fn tile_origin(tile_number: u32) -> (f32, f32) {
    let index = tile_number - 1;
    let column = index % COLUMNS;
    let row = index / COLUMNS;
    ((column * TILE_SIZE) as f32, (row * TILE_SIZE) as f32)
}

/// Draws the main test scene and returns the draws a default-configured
/// renderer is expected to issue for it, in order.
///
/// Opaque shapes without texture all share one batch; the lit quad gets its own
/// draw in the light pass; transparent shapes, at equal depth, keep submission
/// order and split where the texture changes.
pub fn build_main_scene(canvas: &mut Canvas, resources: &SceneResources) -> Vec<DrawExpectation> {
    canvas.begin_frame();

    tile_01_rect_solid(canvas);
    tile_02_rect_outlined(canvas);
    tile_03_concave_polygon(canvas);
    tile_04_stroke_triangle(canvas);
    tile_05_lit_quad(canvas);
    tile_06_alpha_overlap(canvas);
    tile_07_textured_rect(canvas, resources.checkerboard);
    tile_08_text(canvas, &resources.font);

    vec![
        DrawExpectation::opaque(FILL, "opaque_batch"),
        DrawExpectation::opaque(LIGHT, "lit_quad")
            .with_vertex_count(6)
            .with_light_count(2),
        DrawExpectation::transparent(FILL, "alpha_overlap")
            .with_texture(None)
            .with_vertex_count(12),
        DrawExpectation::transparent(FILL, "textured_rect")
            .with_texture(Some(resources.checkerboard))
            .with_vertex_count(6),
        DrawExpectation::transparent(FILL, "text")
            .with_texture(Some(resources.font_atlas()))
            .with_vertex_count(12),
    ]
}

// ── Opaque ───────────────────────────────────────────────────────────────────

fn tile_01_rect_solid(canvas: &mut Canvas) {
    let (ox, oy) = tile_origin(1);
    canvas.push();
    canvas.no_stroke();
    canvas.fill(Color::rgb(220, 50, 50));
    canvas.rect(ox + 10.0, oy + 10.0, 60.0, 60.0);
    canvas.pop();
}

fn tile_02_rect_outlined(canvas: &mut Canvas) {
    let (ox, oy) = tile_origin(2);
    canvas.push();
    canvas.translate(ox + 40.0, oy + 40.0, 0.0);
    canvas.fill(Color::rgb(50, 50, 220));
    canvas.stroke(Color::BLACK);
    canvas.stroke_weight(4.0);
    canvas.stroke_join(StrokeJoin::Miter);
    canvas.rect(-30.0, -30.0, 60.0, 60.0);
    canvas.pop();
}

fn tile_03_concave_polygon(canvas: &mut Canvas) {
    let (ox, oy) = tile_origin(3);
    canvas.push();
    canvas.no_stroke();
    canvas.fill(Color::rgb(40, 180, 60));
    canvas.translate(ox + 10.0, oy + 10.0, 0.0);
    canvas.scale(15.0, 15.0, 1.0);
    canvas.polygon(&[
        [0.0, 0.0, 0.0],
        [4.0, 0.0, 0.0],
        [4.0, 4.0, 0.0],
        [2.0, 2.0, 0.0],
        [0.0, 4.0, 0.0],
    ]);
    canvas.pop();
}

fn tile_04_stroke_triangle(canvas: &mut Canvas) {
    let (ox, oy) = tile_origin(4);
    canvas.push();
    canvas.no_fill();
    canvas.stroke(Color::rgb(20, 20, 20));
    canvas.stroke_weight(3.0);
    canvas.stroke_join(StrokeJoin::Round);
    canvas.triangle(
        [ox + 40.0, oy + 10.0, 0.0],
        [ox + 70.0, oy + 70.0, 0.0],
        [ox + 10.0, oy + 70.0, 0.0],
    );
    canvas.pop();
}

// ── Lit ──────────────────────────────────────────────────────────────────────

fn tile_05_lit_quad(canvas: &mut Canvas) {
    let (ox, oy) = tile_origin(5);
    canvas.push();
    canvas.lights();
    canvas.no_stroke();
    canvas.fill(Color::rgb(200, 200, 200));
    canvas.normal(0.0, 0.0, 1.0);
    canvas.rect(ox + 10.0, oy + 10.0, 60.0, 60.0);
    canvas.no_lights();
    canvas.pop();
}

// ── Transparent ──────────────────────────────────────────────────────────────

fn tile_06_alpha_overlap(canvas: &mut Canvas) {
    let (ox, oy) = tile_origin(6);
    canvas.push();
    canvas.no_stroke();
    canvas.fill(Color::rgba(255, 0, 0, 128));
    canvas.rect(ox + 10.0, oy + 10.0, 40.0, 40.0);
    canvas.fill(Color::rgba(0, 0, 255, 128));
    canvas.rect(ox + 30.0, oy + 30.0, 40.0, 40.0);
    canvas.pop();
}

fn tile_07_textured_rect(canvas: &mut Canvas, texture: TextureId) {
    let (ox, oy) = tile_origin(7);
    canvas.image(texture, ox + 10.0, oy + 10.0, 60.0, 60.0);
}

fn tile_08_text(canvas: &mut Canvas, font: &GridFont) {
    let (ox, oy) = tile_origin(8);
    canvas.push();
    canvas.fill(Color::rgb(255, 255, 0));
    canvas.text(font, "Hi", ox + 10.0, oy + 30.0, 16.0);
    canvas.pop();
}
