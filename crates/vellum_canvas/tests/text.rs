//! Text draw-order tests over a hand-built layout.
//!
//! Canvas text drawing only consumes the layout tables, so these tests
//! fabricate a tiny layout (one run, three glyphs) instead of shaping a
//! real font, and assert on the emitted rect stream.

use std::sync::Arc;

use vellum_canvas::{AtlasGlyph, Canvas, FontAtlas, ShapeDesc, TextBlockStyle, TextStyle};
use vellum_core::{CRect, ColorGradient, Vec2, Vec2I, Vec2U, Vec4};
use vellum_gpu::headless::HeadlessDevice;
use vellum_gpu::GpuContext;
use vellum_text::{
    FontStyle, GlyphShape, Line, LineMetrics, TextBlock, TextLayout, TextRun, TextRunMetrics,
};

const UPEM: u16 = 1000;
const FONT_HEIGHT: f32 = 10.0;

fn fixture() -> (TextBlock, TextLayout, Vec<FontAtlas>) {
    let block = TextBlock {
        codepoints: "abc".chars().map(|c| c as u32).collect(),
        runs: vec![3],
        fonts: vec![FontStyle {
            font: 0,
            font_height: FONT_HEIGHT,
            line_height: 1.2,
            letter_spacing: 0,
            word_spacing: 0,
        }],
        ..Default::default()
    };

    let glyphs = (0..3)
        .map(|i| GlyphShape {
            glyph_id: 1,
            cluster: i,
            advance: Vec2I::new(1000, 0),
            offset: Vec2I::new(0, 0),
        })
        .collect();

    let layout = TextLayout {
        glyphs,
        runs: vec![TextRun {
            first: 0,
            count: 3,
            style: 0,
            font_height: FONT_HEIGHT,
            line_height: 1.2,
            upem: UPEM,
            first_glyph: 0,
            num_glyphs: 3,
            metrics: TextRunMetrics {
                advance: 3000,
                ascent: 800,
                descent: 200,
            },
            level: 0,
            base_level: 0,
            paragraph: true,
            breakable: true,
        }],
        lines: vec![Line {
            first: 0,
            count: 3,
            first_run: 0,
            num_runs: 1,
            metrics: LineMetrics {
                width: 30.0,
                height: 12.0,
                ascent: 8.0,
                descent: 2.0,
                level: 0,
            },
            paragraph: true,
        }],
        max_width: f32::INFINITY,
        extent: Vec2::new(30.0, 12.0),
        ..Default::default()
    };

    let mut atlas = FontAtlas::default();
    atlas.glyphs = vec![
        AtlasGlyph::default(),
        AtlasGlyph {
            extent: Vec2I::new(800, 900),
            bearing: Vec2I::new(50, 700),
            uv: [Vec2::new(0.1, 0.1), Vec2::new(0.4, 0.4)],
            layer: 0,
        },
    ];
    atlas.textures = vec![7];

    (block, layout, vec![atlas])
}

fn styled(foreground: ColorGradient, underline_thickness: f32) -> TextBlockStyle {
    TextBlockStyle {
        runs: vec![TextStyle {
            foreground,
            underline: foreground,
            underline_thickness,
            ..Default::default()
        }],
        alignment: 0.0,
        align_width: 0.0,
    }
}

fn record(style: &TextBlockStyle, clip: CRect) -> Canvas {
    let device = Arc::new(HeadlessDevice::new(2));
    let _gpu = GpuContext::new(device, false, 2, Vec2U::new(256, 256)).unwrap();

    let (block, layout, atlases) = fixture();
    let mut canvas = Canvas::new();
    canvas.begin_recording(Vec2::new(256.0, 256.0));
    canvas.text(
        &ShapeDesc {
            center: Vec2::new(128.0, 128.0),
            ..Default::default()
        },
        &block,
        &layout,
        style,
        &atlases,
        clip,
    );
    canvas.end_recording();
    canvas
}

#[test]
fn test_glyphs_and_underline_emit_rects() {
    let red = ColorGradient::uniform(Vec4::new(1.0, 0.0, 0.0, 1.0));
    let canvas = record(&styled(red, 1.0), CRect::INFINITE);

    // three glyph quads plus one underline quad, all batched into one pass
    assert_eq!(canvas.rrect_params.len(), 4);
    assert_eq!(canvas.passes.len(), 1);
    assert_eq!(canvas.passes[0].name, "RRect");
}

#[test]
fn test_glyph_quads_sample_the_atlas() {
    let red = ColorGradient::uniform(Vec4::new(1.0, 0.0, 0.0, 1.0));
    let canvas = record(&styled(red, 0.0), CRect::INFINITE);

    assert_eq!(canvas.rrect_params.len(), 3);
    for param in &canvas.rrect_params {
        assert_eq!(param.albedo, 7);
        assert_eq!(param.uv, [Vec2::new(0.1, 0.1), Vec2::new(0.4, 0.4)]);
    }
}

#[test]
fn test_transparent_foreground_emits_nothing() {
    let canvas = record(&styled(ColorGradient::TRANSPARENT, 0.0), CRect::INFINITE);
    assert!(canvas.rrect_params.is_empty());
    assert!(canvas.passes.is_empty());
}

#[test]
fn test_lines_outside_clip_are_culled() {
    let red = ColorGradient::uniform(Vec4::new(1.0, 0.0, 0.0, 1.0));
    let far = CRect::new(Vec2::new(-4000.0, -4000.0), Vec2::new(8.0, 8.0));
    let canvas = record(&styled(red, 1.0), far);
    assert!(canvas.rrect_params.is_empty());
}

#[test]
fn test_glyph_advance_spaces_quads() {
    let red = ColorGradient::uniform(Vec4::new(1.0, 0.0, 0.0, 1.0));
    let canvas = record(&styled(red, 0.0), CRect::INFINITE);

    // advances of 1000 design units at height 10 with upem 1000 step the
    // glyph transforms by 10 pixels horizontally
    let x0 = canvas.rrect_params[0].transform.cols[3][0];
    let x1 = canvas.rrect_params[1].transform.cols[3][0];
    let x2 = canvas.rrect_params[2].transform.cols[3][0];
    assert!((x1 - x0 - 10.0).abs() < 1e-4);
    assert!((x2 - x1 - 10.0).abs() < 1e-4);
}
