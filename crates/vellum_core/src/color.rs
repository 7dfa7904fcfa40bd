//! Four-corner color gradients used as shape tints.

use crate::math::Vec4;

/// Linear color gradient across the four corners of a shape, in the order
/// top-left, top-right, bottom-left, bottom-right.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorGradient {
    pub tl: Vec4,
    pub tr: Vec4,
    pub bl: Vec4,
    pub br: Vec4,
}

impl ColorGradient {
    pub const TRANSPARENT: Self = Self {
        tl: Vec4::ZERO,
        tr: Vec4::ZERO,
        bl: Vec4::ZERO,
        br: Vec4::ZERO,
    };

    /// Uniform tint across all four corners.
    pub const fn uniform(color: Vec4) -> Self {
        Self {
            tl: color,
            tr: color,
            bl: color,
            br: color,
        }
    }

    /// Top-to-bottom gradient.
    pub const fn vertical(top: Vec4, bottom: Vec4) -> Self {
        Self {
            tl: top,
            tr: top,
            bl: bottom,
            br: bottom,
        }
    }

    /// Left-to-right gradient.
    pub const fn horizontal(left: Vec4, right: Vec4) -> Self {
        Self {
            tl: left,
            tr: right,
            bl: left,
            br: right,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.tl.w == 0.0 && self.tr.w == 0.0 && self.bl.w == 0.0 && self.br.w == 0.0
    }

    pub fn corners(&self) -> [Vec4; 4] {
        [self.tl, self.tr, self.bl, self.br]
    }
}
