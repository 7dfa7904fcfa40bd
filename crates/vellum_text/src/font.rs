//! Font handles.
//!
//! Font file loading and rasterization are external; a [`Font`] only owns
//! the raw table bytes and the design-space metrics layout needs. Shaping
//! borrows a `rustybuzz::Face` from the bytes on demand.

use std::sync::Arc;

use crate::{Result, TextError};

/// An immutable font face: raw bytes plus cached design-unit metrics.
pub struct Font {
    data: Arc<Vec<u8>>,
    index: u32,
    upem: u16,
    ascent: i32,
    descent: i32,
    space_glyph: Option<u16>,
}

impl Font {
    /// Validate `data` and cache the face metrics. The bytes are parsed
    /// again on every shaping call; construction only proves they parse.
    pub fn from_bytes(data: Arc<Vec<u8>>, index: u32) -> Result<Self> {
        let face = rustybuzz::Face::from_slice(&data, index).ok_or(TextError::FontParse {
            index,
            reason: "not a parseable font face",
        })?;

        let upem = face.units_per_em() as u16;
        let ascent = face.ascender() as i32;
        // descender is negative in design space; layout wants a magnitude
        let descent = -(face.descender() as i32);
        let space_glyph = face.glyph_index(' ').map(|id| id.0);

        Ok(Self {
            data,
            index,
            upem,
            ascent,
            descent,
            space_glyph,
        })
    }

    pub fn upem(&self) -> u16 {
        self.upem
    }

    /// Typographic ascent in design units.
    pub fn ascent(&self) -> i32 {
        self.ascent
    }

    /// Typographic descent in design units (positive magnitude).
    pub fn descent(&self) -> i32 {
        self.descent
    }

    pub fn space_glyph(&self) -> Option<u16> {
        self.space_glyph
    }

    /// Borrow a shaping face over the font bytes.
    pub fn face(&self) -> rustybuzz::Face<'_> {
        rustybuzz::Face::from_slice(&self.data, self.index)
            .expect("font bytes were validated at construction")
    }
}

/// Style parameters for one run range of a [`crate::TextBlock`].
#[derive(Clone, Copy, Debug)]
pub struct FontStyle {
    /// Index into the font slice handed to `layout_text`.
    pub font: usize,
    /// Render height in pixels.
    pub font_height: f32,
    /// Line height multiplier, >= 1.
    pub line_height: f32,
    /// Extra advance per glyph, in design units.
    pub letter_spacing: i32,
    /// Extra advance per whitespace-terminated word, in design units.
    pub word_spacing: i32,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            font: 0,
            font_height: 16.0,
            line_height: 1.2,
            letter_spacing: 0,
            word_spacing: 0,
        }
    }
}
