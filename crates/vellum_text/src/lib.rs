//! Vellum Text
//!
//! Unicode text layout over UTF-32 input:
//!
//! - style, paragraph and script segmentation
//! - bidi embedding levels (UAX #9 via `unicode-bidi`)
//! - shaping through `rustybuzz` with per-block kerning/ligature features
//! - greedy first-fit line breaking and visual run reordering
//! - hit testing from pixel positions back to clusters
//!
//! Glyph advances and metrics stay in font design units; conversion to
//! pixels is `v * font_height / upem`, so a layout is cacheable across font
//! sizes as long as each font's upem is fixed.

pub mod font;
pub mod hit;
pub mod layout;

pub use font::{Font, FontStyle};
pub use hit::{hit_text, TextHit};
pub use layout::{
    au_to_px, layout_text, GlyphShape, Line, LineMetrics, TextBlock, TextDirection, TextLayout,
    TextRun, TextRunMetrics, TextSegment,
};

use thiserror::Error;

/// Text stack errors.
#[derive(Error, Debug)]
pub enum TextError {
    #[error("failed to parse font face {index}: {reason}")]
    FontParse { index: u32, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, TextError>;
