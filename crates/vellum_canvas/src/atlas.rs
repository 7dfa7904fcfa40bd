//! Font atlas model and text render styles.
//!
//! Rasterization happens outside the engine; the canvas only needs to know,
//! per glyph, where its quad sits in design space and which atlas layer and
//! UV rect sample it.

use vellum_core::{ColorGradient, Vec2, Vec2I};

/// Placement of one rasterized glyph.
#[derive(Clone, Copy, Debug, Default)]
pub struct AtlasGlyph {
    /// Glyph quad extent in design units.
    pub extent: Vec2I,
    /// Bearing from the pen position to the quad's top-left, design units.
    pub bearing: Vec2I,
    /// UV of the upper-left and lower-right corners within the layer.
    pub uv: [Vec2; 2],
    /// Atlas layer holding the raster.
    pub layer: u32,
}

/// One font's atlas: per-glyph placements plus the bindless texture slot of
/// each layer.
#[derive(Default)]
pub struct FontAtlas {
    /// Indexed by glyph id.
    pub glyphs: Vec<AtlasGlyph>,
    /// Texture slot per atlas layer.
    pub textures: Vec<u32>,
}

/// Render styling of one text style run.
#[derive(Clone, Copy, Debug)]
pub struct TextStyle {
    pub foreground: ColorGradient,
    pub background: ColorGradient,
    pub shadow: ColorGradient,
    /// Shadow quad scale relative to the glyph quad; 0 disables shadows.
    pub shadow_scale: f32,
    /// Shadow offset in pixels.
    pub shadow_offset: Vec2,
    pub underline: ColorGradient,
    /// Underline thickness in pixels; 0 disables.
    pub underline_thickness: f32,
    pub strikethrough: ColorGradient,
    /// Strikethrough thickness in pixels; 0 disables.
    pub strikethrough_thickness: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            foreground: ColorGradient::default(),
            background: ColorGradient::default(),
            shadow: ColorGradient::default(),
            shadow_scale: 0.0,
            shadow_offset: Vec2::ZERO,
            underline: ColorGradient::default(),
            underline_thickness: 0.0,
            strikethrough: ColorGradient::default(),
            strikethrough_thickness: 0.0,
        }
    }
}

/// Block-level text styling: one [`TextStyle`] per style run plus
/// alignment of the lines within the block.
#[derive(Default)]
pub struct TextBlockStyle {
    pub runs: Vec<TextStyle>,
    /// -1 leading, 0 centered, +1 trailing; the axis flips on RTL lines.
    pub alignment: f32,
    /// Minimum width the lines align within.
    pub align_width: f32,
}
