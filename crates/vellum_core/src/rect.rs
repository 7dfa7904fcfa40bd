//! Rectangle types.
//!
//! `Rect` is corner-origin (offset + extent), `CRect` is center-origin and is
//! what the canvas uses for clips, `RectU` is the pixel-space scissor form.

use crate::math::{Vec2, Vec2U};

/// Corner-origin rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub offset: Vec2,
    pub extent: Vec2,
}

/// Corner-origin rectangle in unsigned pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RectU {
    pub offset: Vec2U,
    pub extent: Vec2U,
}

/// Center-origin rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CRect {
    pub center: Vec2,
    pub extent: Vec2,
}

impl CRect {
    /// A clip that excludes nothing.
    pub const INFINITE: Self = Self {
        center: Vec2::ZERO,
        extent: Vec2::splat(f32::MAX),
    };

    pub const fn new(center: Vec2, extent: Vec2) -> Self {
        Self { center, extent }
    }

    pub fn begin(&self) -> Vec2 {
        self.center - self.extent * 0.5
    }

    pub fn end(&self) -> Vec2 {
        self.center + self.extent * 0.5
    }

    pub fn overlaps(&self, other: &CRect) -> bool {
        let a0 = self.begin();
        let a1 = self.end();
        let b0 = other.begin();
        let b1 = other.end();
        a0.x <= b1.x && a1.x >= b0.x && a0.y <= b1.y && a1.y >= b0.y
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let b = self.begin();
        let e = self.end();
        point.x >= b.x && point.x <= e.x && point.y >= b.y && point.y <= e.y
    }
}

impl Default for CRect {
    fn default() -> Self {
        Self::INFINITE
    }
}
