//! Glyph-quad text.
//!
//! Rasterizing fonts is left to the application: a [`GlyphProvider`] owns an atlas
//! texture and lays out a string as one textured quad per glyph.
//! [`Canvas::text`](crate::Canvas::text) turns those quads into an ordinary
//! `Quads` shape, so text batches with every other shape using the same atlas.
//!
//! # Examples
//!
//! ```rust
//! use tessera::{GlyphProvider, GridFont, TextureId};
//!
//! // 16x16 cells covering ASCII 32..=127, six rows of sixteen.
//! let font = GridFont::new(TextureId(1), 16, 6, ' ');
//! let mut quads = Vec::new();
//! font.append_glyph_quads("Hi", [10.0, 20.0], 8.0, &mut quads);
//!
//! assert_eq!(quads.len(), 2);
//! assert_eq!(quads[1].min, [18.0, 20.0]);
//! ```

use crate::id::TextureId;

/// One glyph: a screen-space rectangle and the atlas region drawn into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphQuad {
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

impl GlyphQuad {
    /// Corners in `Quads` order: min, (max.x, min.y), max, (min.x, max.y).
    pub fn corners(&self) -> [([f32; 2], [f32; 2]); 4] {
        [
            (self.min, self.uv_min),
            ([self.max[0], self.min[1]], [self.uv_max[0], self.uv_min[1]]),
            (self.max, self.uv_max),
            ([self.min[0], self.max[1]], [self.uv_min[0], self.uv_max[1]]),
        ]
    }
}

pub trait GlyphProvider {
    /// Texture holding every glyph the provider emits.
    fn atlas(&self) -> TextureId;

    /// Lays out `text` starting at `origin` (top-left of the first line) with the
    /// given font size, appending one quad per visible glyph.
    fn append_glyph_quads(&self, text: &str, origin: [f32; 2], size: f32, out: &mut Vec<GlyphQuad>);
}

/// Specifies the horizontal alignment of each line relative to the origin.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum TextAlignment {
    /// Lines start at the origin.
    #[default]
    Start,
    /// Lines are centered on the origin.
    Center,
    /// Lines end at the origin.
    End,
}

/// Monospace font baked into a regular grid atlas, one cell per character,
/// laid out row-major starting at `first`.
#[derive(Debug, Clone)]
pub struct GridFont {
    atlas: TextureId,
    columns: u32,
    rows: u32,
    first: char,
    /// Advance as a fraction of the font size.
    advance: f32,
    line_height: f32,
    alignment: TextAlignment,
}

impl GridFont {
    pub fn new(atlas: TextureId, columns: u32, rows: u32, first: char) -> Self {
        Self {
            atlas,
            columns: columns.max(1),
            rows: rows.max(1),
            first,
            advance: 1.0,
            line_height: 1.0,
            alignment: TextAlignment::Start,
        }
    }

    pub fn with_advance(mut self, advance: f32) -> Self {
        self.advance = advance;
        self
    }

    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.line_height = line_height;
        self
    }

    pub fn with_alignment(mut self, alignment: TextAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    fn cell(&self, character: char) -> Option<u32> {
        let index = (character as u32).checked_sub(self.first as u32)?;
        (index < self.columns * self.rows).then_some(index)
    }

    fn line_offset(&self, width: f32) -> f32 {
        match self.alignment {
            TextAlignment::Start => 0.0,
            TextAlignment::Center => -width * 0.5,
            TextAlignment::End => -width,
        }
    }
}

impl GlyphProvider for GridFont {
    fn atlas(&self) -> TextureId {
        self.atlas
    }

    fn append_glyph_quads(&self, text: &str, origin: [f32; 2], size: f32, out: &mut Vec<GlyphQuad>) {
        let advance = self.advance * size;
        let cell_size = [1.0 / self.columns as f32, 1.0 / self.rows as f32];

        for (line_index, line) in text.lines().enumerate() {
            let width = line.chars().count() as f32 * advance;
            let x0 = origin[0] + self.line_offset(width);
            let y = origin[1] + line_index as f32 * self.line_height * size;

            for (column, character) in line.chars().enumerate() {
                // Whitespace and characters outside the atlas only advance the pen.
                if character.is_whitespace() {
                    continue;
                }
                let Some(cell) = self.cell(character) else {
                    continue;
                };
                let uv_min = [
                    (cell % self.columns) as f32 * cell_size[0],
                    (cell / self.columns) as f32 * cell_size[1],
                ];
                let x = x0 + column as f32 * advance;
                out.push(GlyphQuad {
                    min: [x, y],
                    max: [x + size, y + size],
                    uv_min,
                    uv_max: [uv_min[0] + cell_size[0], uv_min[1] + cell_size[1]],
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_whitespace_and_unknown_characters() {
        let font = GridFont::new(TextureId(1), 16, 6, ' ');
        let mut quads = Vec::new();
        font.append_glyph_quads("a b\u{e9}", [0.0, 0.0], 10.0, &mut quads);
        assert_eq!(quads.len(), 2);
        assert_eq!(quads[1].min, [20.0, 0.0]);
    }

    #[test]
    fn atlas_cells_are_row_major() {
        let font = GridFont::new(TextureId(1), 4, 4, 'A');
        let mut quads = Vec::new();
        font.append_glyph_quads("F", [0.0, 0.0], 1.0, &mut quads);
        // 'F' is cell 5: column 1, row 1.
        assert_eq!(quads[0].uv_min, [0.25, 0.25]);
        assert_eq!(quads[0].uv_max, [0.5, 0.5]);
    }

    #[test]
    fn lines_and_alignment() {
        let font = GridFont::new(TextureId(1), 16, 6, ' ')
            .with_line_height(1.5)
            .with_alignment(TextAlignment::Center);
        let mut quads = Vec::new();
        font.append_glyph_quads("ab\ncd", [100.0, 0.0], 10.0, &mut quads);
        assert_eq!(quads.len(), 4);
        assert_eq!(quads[0].min, [90.0, 0.0]);
        assert_eq!(quads[2].min, [90.0, 15.0]);
    }
}
