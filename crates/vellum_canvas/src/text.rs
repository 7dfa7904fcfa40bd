//! Text drawing.
//!
//! A laid-out text block decomposes into textured rect draws against the
//! font atlases. Drawing happens in five fixed passes over the whole block
//! so z-order within a block is stable regardless of run order: run
//! backgrounds, glyph shadows, glyphs, underlines, strikethroughs.

use vellum_core::{CRect, Mat4, Vec2};
use vellum_text::{au_to_px, TextBlock, TextLayout};

use crate::atlas::FontAtlas;
use crate::canvas::{Canvas, ShapeDesc};
use crate::TextBlockStyle;

const PASS_BACKGROUND: u8 = 0;
const PASS_GLYPH_SHADOWS: u8 = 1;
const PASS_GLYPHS: u8 = 2;
const PASS_UNDERLINE: u8 = 3;
const PASS_STRIKETHROUGH: u8 = 4;
const NUM_PASSES: u8 = 5;

impl Canvas {
    /// Draw a laid-out text block using font atlases.
    ///
    /// Only `desc.center`, `desc.transform`, `desc.sampler`, `desc.tiling`
    /// and `desc.edge_smoothness` are consumed from `desc`; colors come
    /// from `style`. Lines whose rect misses `clip` are culled.
    ///
    /// Panics if `style.runs` does not pair up with `block.fonts`; that is
    /// a programmer error.
    pub fn text(
        &mut self,
        desc: &ShapeDesc,
        block: &TextBlock,
        layout: &TextLayout,
        style: &TextBlockStyle,
        atlases: &[FontAtlas],
        clip: CRect,
    ) -> &mut Self {
        assert_eq!(
            style.runs.len(),
            block.fonts.len(),
            "text styles and block fonts must pair up"
        );

        let block_width = layout.extent.x.max(style.align_width);
        let block_height = layout.extent.y;

        for pass in 0..NUM_PASSES {
            let mut line_y = -block_height * 0.5;
            for ln in &layout.lines {
                let line_rect = CRect::new(
                    desc.center + Vec2::new(0.0, line_y + ln.metrics.height * 0.5),
                    Vec2::new(block_width, ln.metrics.height),
                );
                if !clip.overlaps(&line_rect) {
                    line_y += ln.metrics.height;
                    continue;
                }

                line_y += ln.metrics.height;
                let baseline = line_y - ln.metrics.descent;
                let rtl_line = ln.metrics.level % 2 == 1;
                // the alignment axis flips on RTL lines
                let alignment = style.alignment * if rtl_line { -1.0 } else { 1.0 };
                let mut cursor =
                    vellum_core::space_align(block_width, ln.metrics.width, alignment)
                        - ln.metrics.width * 0.5;

                let runs = &layout.runs
                    [ln.first_run as usize..(ln.first_run + ln.num_runs) as usize];
                for run in runs {
                    let font_style = &block.fonts[run.style as usize];
                    let run_style = &style.runs[run.style as usize];
                    let atlas = &atlases[font_style.font];
                    let run_width =
                        au_to_px(run.metrics.advance as f32, run.font_height, run.upem);

                    if pass == PASS_BACKGROUND && !run_style.background.is_transparent() {
                        let extent = Vec2::new(
                            run_width,
                            au_to_px(run.metrics.ascent as f32, run.font_height, run.upem)
                                + ln.metrics.height,
                        );
                        let center =
                            Vec2::new(cursor + extent.x * 0.5, line_y - extent.y * 0.5);
                        self.rect(&ShapeDesc {
                            center: desc.center,
                            extent,
                            transform: desc.transform * Mat4::translate(center),
                            tint: run_style.background,
                            ..Default::default()
                        });
                    }

                    let mut glyph_cursor = cursor;
                    for g in 0..run.num_glyphs {
                        let shape = &layout.glyphs[(run.first_glyph + g) as usize];
                        let advance =
                            au_to_px(shape.advance.x as f32, run.font_height, run.upem);

                        let Some(glyph) = atlas.glyphs.get(shape.glyph_id as usize) else {
                            glyph_cursor += advance;
                            continue;
                        };
                        let Some(&texture) = atlas.textures.get(glyph.layer as usize) else {
                            glyph_cursor += advance;
                            continue;
                        };

                        let extent = Vec2::new(
                            au_to_px(glyph.extent.x as f32, run.font_height, run.upem),
                            au_to_px(glyph.extent.y as f32, run.font_height, run.upem),
                        );
                        let center = Vec2::new(glyph_cursor, baseline)
                            + Vec2::new(
                                au_to_px(glyph.bearing.x as f32, run.font_height, run.upem),
                                -au_to_px(glyph.bearing.y as f32, run.font_height, run.upem),
                            )
                            + Vec2::new(
                                au_to_px(shape.offset.x as f32, run.font_height, run.upem),
                                -au_to_px(shape.offset.y as f32, run.font_height, run.upem),
                            )
                            + extent * 0.5;

                        if pass == PASS_GLYPH_SHADOWS
                            && run_style.shadow_scale != 0.0
                            && !run_style.shadow.is_transparent()
                        {
                            let shadow_extent = extent * run_style.shadow_scale;
                            let shadow_center = center + run_style.shadow_offset;
                            self.rect(&ShapeDesc {
                                center: desc.center,
                                extent: shadow_extent,
                                transform: desc.transform * Mat4::translate(shadow_center),
                                tint: run_style.shadow,
                                sampler: desc.sampler,
                                texture,
                                uv: glyph.uv,
                                tiling: desc.tiling,
                                edge_smoothness: desc.edge_smoothness,
                                ..Default::default()
                            });
                        }

                        if pass == PASS_GLYPHS && !run_style.foreground.is_transparent() {
                            self.rect(&ShapeDesc {
                                center: desc.center,
                                extent,
                                transform: desc.transform * Mat4::translate(center),
                                tint: run_style.foreground,
                                sampler: desc.sampler,
                                texture,
                                uv: glyph.uv,
                                tiling: desc.tiling,
                                edge_smoothness: desc.edge_smoothness,
                                ..Default::default()
                            });
                        }

                        glyph_cursor += advance;
                    }

                    if pass == PASS_UNDERLINE && run_style.underline_thickness != 0.0 {
                        let extent = Vec2::new(run_width, run_style.underline_thickness);
                        let center = Vec2::new(cursor, baseline + 2.0) + extent * 0.5;
                        self.rect(&ShapeDesc {
                            center: desc.center,
                            extent,
                            transform: desc.transform * Mat4::translate(center),
                            tint: run_style.underline,
                            sampler: desc.sampler,
                            tiling: desc.tiling,
                            edge_smoothness: desc.edge_smoothness,
                            ..Default::default()
                        });
                    }

                    if pass == PASS_STRIKETHROUGH && run_style.strikethrough_thickness != 0.0 {
                        let extent = Vec2::new(run_width, run_style.strikethrough_thickness);
                        let center = Vec2::new(cursor, baseline - run.font_height * 0.5)
                            + extent * 0.5;
                        self.rect(&ShapeDesc {
                            center: desc.center,
                            extent,
                            transform: desc.transform * Mat4::translate(center),
                            tint: run_style.strikethrough,
                            sampler: desc.sampler,
                            tiling: desc.tiling,
                            edge_smoothness: desc.edge_smoothness,
                            ..Default::default()
                        });
                    }

                    cursor += run_width;
                }
            }
        }

        self
    }
}
