//! Layout pipeline tests against a real system font.
//!
//! Shaping needs actual font tables, so these tests pull the first usable
//! face from the system font database and skip (with a note) on machines
//! that have none. Assertions avoid font-specific metrics: they check line
//! structure, cluster coverage and monotonicity, which hold for any face.

use std::sync::Arc;

use vellum_core::Vec2;
use vellum_text::{
    hit_text, layout_text, Font, FontStyle, TextBlock, TextDirection,
};

fn system_font() -> Option<Font> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    for face in db.faces() {
        let data: Option<(Vec<u8>, u32)> = match &face.source {
            fontdb::Source::File(path) => std::fs::read(path).ok().map(|d| (d, face.index)),
            fontdb::Source::Binary(data) => {
                Some(((*data).as_ref().as_ref().to_vec(), face.index))
            }
            fontdb::Source::SharedFile(_, data) => {
                Some(((*data).as_ref().as_ref().to_vec(), face.index))
            }
        };
        if let Some((data, index)) = data {
            if let Ok(font) = Font::from_bytes(Arc::new(data), index) {
                return Some(font);
            }
        }
    }
    None
}

fn block(text: &str) -> TextBlock {
    let codepoints: Vec<u32> = text.chars().map(|c| c as u32).collect();
    let len = codepoints.len() as u32;
    TextBlock {
        codepoints,
        runs: vec![len],
        fonts: vec![FontStyle::default()],
        language: String::new(),
        direction: TextDirection::LeftToRight,
        use_kerning: true,
        use_ligatures: true,
    }
}

macro_rules! require_font {
    () => {
        match system_font() {
            Some(font) => font,
            None => {
                eprintln!("no system font available, skipping");
                return;
            }
        }
    };
}

#[test]
fn test_paragraph_break_makes_two_lines() {
    let font = require_font!();
    let layout = layout_text(&block("abc\ndef"), &[font], f32::INFINITY);

    assert_eq!(layout.lines.len(), 2);
    assert_eq!(layout.lines[0].first, 0);
    assert_eq!(layout.lines[0].count, 3);
    assert_eq!(layout.lines[1].first, 4);
    assert_eq!(layout.lines[1].count, 3);
    assert!(layout.lines[0].paragraph);
    assert!(layout.lines[1].paragraph);
}

#[test]
fn test_unbounded_width_line_count_matches_breaks() {
    let font = require_font!();
    let layout = layout_text(&block("one\ntwo\r\nthree\nfour"), &[font], f32::INFINITY);
    assert_eq!(layout.lines.len(), 4);
}

#[test]
fn test_trailing_newline_gives_empty_last_line() {
    let font = require_font!();
    let layout = layout_text(&block("abc\n"), &[font], f32::INFINITY);
    assert_eq!(layout.lines.len(), 2);
    assert_eq!(layout.lines[1].count, 0);
    assert!(layout.lines[1].metrics.height > 0.0);
}

#[test]
fn test_wrapping_splits_words() {
    let font = require_font!();
    let unbounded = layout_text(
        &block("alpha beta gamma delta"),
        std::slice::from_ref(&font),
        f32::INFINITY,
    );
    assert_eq!(unbounded.lines.len(), 1);
    let full_width = unbounded.extent.x;
    assert!(full_width > 0.0);

    let wrapped = layout_text(
        &block("alpha beta gamma delta"),
        &[font],
        full_width / 2.0,
    );
    assert!(wrapped.lines.len() >= 2);
    // wrapping must preserve every codepoint across lines
    let covered: u32 = wrapped.lines.iter().map(|l| l.count).sum();
    assert!(covered >= "alpha beta gamma delta".len() as u32 - wrapped.lines.len() as u32);
    for line in &wrapped.lines[1..] {
        assert!(!line.paragraph);
    }
}

#[test]
fn test_glyph_clusters_cover_text() {
    let font = require_font!();
    let layout = layout_text(&block("hello"), &[font], f32::INFINITY);

    assert_eq!(layout.runs.len(), 1);
    let run = &layout.runs[0];
    assert!(run.num_glyphs > 0);
    assert!(run.metrics.advance > 0);
    assert!(run.metrics.ascent > 0);

    for glyph in &layout.glyphs {
        assert!(glyph.cluster < 5);
    }
}

#[test]
fn test_segments_mark_break_opportunities() {
    let font = require_font!();
    let layout = layout_text(&block("ab cd"), &[font], f32::INFINITY);

    assert!(layout.segments[0].breakable);
    assert!(!layout.segments[1].breakable);
    assert!(!layout.segments[2].breakable);
    assert!(layout.segments[3].breakable);
}

#[test]
fn test_two_styles_split_runs() {
    let font = require_font!();
    let codepoints: Vec<u32> = "aabb".chars().map(|c| c as u32).collect();
    let block = TextBlock {
        codepoints,
        runs: vec![2, 4],
        fonts: vec![
            FontStyle {
                font_height: 16.0,
                ..Default::default()
            },
            FontStyle {
                font_height: 32.0,
                ..Default::default()
            },
        ],
        language: String::new(),
        direction: TextDirection::LeftToRight,
        use_kerning: false,
        use_ligatures: false,
    };
    let layout = layout_text(&block, &[font], f32::INFINITY);

    assert_eq!(layout.lines.len(), 1);
    assert_eq!(layout.runs.len(), 2);
    assert_eq!(layout.runs[0].style, 0);
    assert_eq!(layout.runs[1].style, 1);
    assert_eq!(layout.runs[0].font_height, 16.0);
    assert_eq!(layout.runs[1].font_height, 32.0);
}

#[test]
fn test_extent_accumulates_line_heights() {
    let font = require_font!();
    let layout = layout_text(&block("a\nb\nc"), &[font], f32::INFINITY);
    let total: f32 = layout.lines.iter().map(|l| l.metrics.height).sum();
    assert_eq!(layout.lines.len(), 3);
    assert!((layout.extent.y - total).abs() < 1e-4);
}

#[test]
fn test_hit_testing_clamps() {
    let font = require_font!();
    let layout = layout_text(&block("hi\nthere"), &[font], f32::INFINITY);

    // far above-left clamps to the first cluster
    let hit = hit_text(&layout, Vec2::new(-100.0, -100.0));
    assert_eq!(hit.line, 0);
    assert_eq!(hit.column, 0);

    // far below clamps to the last line
    let hit = hit_text(&layout, Vec2::new(0.0, 1.0e6));
    assert_eq!(hit.line, 1);

    // past the end of a line clamps to its last column
    let hit = hit_text(&layout, Vec2::new(1.0e6, 0.0));
    assert_eq!(hit.line, 0);
    assert_eq!(hit.column, layout.lines[0].count);
}

#[test]
fn test_hit_testing_walks_advances() {
    let font = require_font!();
    let layout = layout_text(&block("mmmm"), &[font], f32::INFINITY);
    let width = layout.extent.x;

    let first = hit_text(&layout, Vec2::new(width * 0.1, 0.0));
    let last = hit_text(&layout, Vec2::new(width * 0.9, 0.0));
    assert!(first.cluster < last.cluster);
}

#[test]
fn test_rtl_runs_get_odd_levels() {
    let font = require_font!();
    let layout = layout_text(&block("שלום"), &[font], f32::INFINITY);
    assert!(!layout.runs.is_empty());
    for run in &layout.runs {
        assert_eq!(run.level % 2, 1);
    }
}

#[test]
fn test_mixed_direction_reorders_visually() {
    let font = require_font!();
    let layout = layout_text(&block("ab שלום cd"), &[font], f32::INFINITY);
    assert_eq!(layout.lines.len(), 1);

    // logical coverage survives reordering
    let line = &layout.lines[0];
    let runs = &layout.runs[line.first_run as usize..(line.first_run + line.num_runs) as usize];
    let mut firsts: Vec<u32> = runs.iter().map(|r| r.first).collect();
    firsts.sort_unstable();
    assert_eq!(firsts[0], 0);
    let covered: u32 = runs.iter().map(|r| r.count).sum();
    assert_eq!(covered, line.count);
}

#[test]
fn test_empty_block_without_fonts_is_empty() {
    let layout = layout_text(&TextBlock::default(), &[], f32::INFINITY);
    assert!(layout.lines.is_empty());
    assert!(layout.runs.is_empty());
    assert_eq!(hit_text(&layout, Vec2::new(10.0, 10.0)), Default::default());
}

#[test]
#[should_panic(expected = "pair up")]
fn test_mismatched_runs_and_fonts_panic() {
    let block = TextBlock {
        codepoints: vec!['a' as u32],
        runs: vec![1],
        fonts: Vec::new(),
        ..Default::default()
    };
    layout_text(&block, &[], f32::INFINITY);
}
