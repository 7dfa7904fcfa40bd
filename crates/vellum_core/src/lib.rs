//! Vellum Core
//!
//! Foundational types shared by every other Vellum crate:
//!
//! - **Math**: `Vec2`/`Vec4`/`Mat4` in GPU-compatible layouts
//! - **Rects**: corner-origin and center-origin rectangles
//! - **Color**: four-corner tint gradients
//! - **Frame arena**: chunked bump allocation reclaimed once per frame
//! - **Bitset**: dense slot allocator backing bindless texture/sampler slots

pub mod arena;
pub mod bitset;
pub mod color;
pub mod math;
pub mod rect;

pub use arena::FrameArena;
pub use bitset::Bitset;
pub use color::ColorGradient;
pub use math::{bezier, cubic_bezier, rotor, space_align, Mat4, Vec2, Vec2I, Vec2U, Vec4};
pub use rect::{CRect, Rect, RectU};
