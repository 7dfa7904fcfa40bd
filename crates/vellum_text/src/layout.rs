//! Text layout pipeline.
//!
//! Runs over UTF-32 codepoints in stages: style segmentation, paragraph
//! segmentation, script classification, bidi leveling, break-opportunity
//! marking, shaped run building, greedy line breaking, and visual
//! reordering. All glyph geometry stays in font design units.

use smallvec::SmallVec;
use unicode_bidi::{BidiInfo, Level};
use unicode_script::{Script, UnicodeScript};
use vellum_core::{Vec2, Vec2I};

use crate::font::{Font, FontStyle};

/// Base paragraph direction of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextDirection {
    /// Detect from the first strong character, defaulting to LTR.
    #[default]
    LeftToRight,
    /// Force RTL paragraphs.
    RightToLeft,
}

/// A block of text to lay out. Codepoints are pre-decoded UTF-32 and are
/// not validated here.
#[derive(Default)]
pub struct TextBlock {
    pub codepoints: Vec<u32>,
    /// Exclusive end codepoint offset of each style range.
    pub runs: Vec<u32>,
    /// One style per entry of `runs`.
    pub fonts: Vec<FontStyle>,
    /// BCP-47 language tag; empty selects the shaper default.
    pub language: String,
    pub direction: TextDirection,
    pub use_kerning: bool,
    pub use_ligatures: bool,
}

/// Per-codepoint classification produced by the segmentation stages.
#[derive(Clone, Copy, Debug)]
pub struct TextSegment {
    pub style: u16,
    pub script: Script,
    pub paragraph_begin: bool,
    pub paragraph_end: bool,
    /// A line break may be taken immediately before this codepoint.
    pub breakable: bool,
    /// Bidi embedding level; even is LTR, odd is RTL.
    pub level: u8,
    /// Base level of the containing paragraph.
    pub base_level: u8,
}

/// One shaped glyph, in design units.
#[derive(Clone, Copy, Debug)]
pub struct GlyphShape {
    pub glyph_id: u32,
    /// Codepoint index this glyph maps back to.
    pub cluster: u32,
    pub advance: Vec2I,
    pub offset: Vec2I,
}

/// Advance/ascent/descent of a run, in design units.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextRunMetrics {
    pub advance: i32,
    pub ascent: i32,
    pub descent: i32,
}

/// A maximal same-style, same-script, same-level stretch of one paragraph,
/// shaped as a unit.
#[derive(Clone, Copy, Debug)]
pub struct TextRun {
    pub first: u32,
    pub count: u32,
    pub style: u16,
    pub font_height: f32,
    pub line_height: f32,
    pub upem: u16,
    pub first_glyph: u32,
    pub num_glyphs: u32,
    pub metrics: TextRunMetrics,
    pub level: u8,
    pub base_level: u8,
    /// The run begins its paragraph.
    pub paragraph: bool,
    /// A line break may be taken before this run.
    pub breakable: bool,
}

/// Pixel-space metrics of a laid-out line.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineMetrics {
    pub width: f32,
    pub height: f32,
    pub ascent: f32,
    pub descent: f32,
    /// Base level of the line's paragraph.
    pub level: u8,
}

#[derive(Clone, Copy, Debug)]
pub struct Line {
    pub first: u32,
    pub count: u32,
    pub first_run: u32,
    pub num_runs: u32,
    pub metrics: LineMetrics,
    /// The line is the first line of its paragraph.
    pub paragraph: bool,
}

/// Output of [`layout_text`].
#[derive(Default)]
pub struct TextLayout {
    pub segments: Vec<TextSegment>,
    pub runs: Vec<TextRun>,
    pub glyphs: Vec<GlyphShape>,
    pub lines: Vec<Line>,
    pub max_width: f32,
    /// Max line width by sum of line heights, in pixels.
    pub extent: Vec2,
}

/// Design units to pixels at a render height of `font_height`.
pub fn au_to_px(units: f32, font_height: f32, upem: u16) -> f32 {
    units * font_height / upem as f32
}

fn is_word_space(cp: u32) -> bool {
    cp == ' ' as u32 || cp == '\t' as u32
}

/// Map a unicode script to the shaper's ISO 15924 script.
fn shaping_script(script: Script) -> rustybuzz::Script {
    let name = script.short_name().as_bytes();
    let tag = if name.len() == 4 {
        rustybuzz::ttf_parser::Tag::from_bytes(&[name[0], name[1], name[2], name[3]])
    } else {
        rustybuzz::ttf_parser::Tag::from_bytes(b"Zyyy")
    };
    rustybuzz::Script::from_iso15924_tag(tag).unwrap_or(rustybuzz::script::COMMON)
}

/// Content ranges of paragraphs: separators (`\r`, `\n`, `\r\n`) delimit
/// and are excluded.
fn split_paragraphs(codepoints: &[u32]) -> Vec<(usize, usize)> {
    let mut paragraphs = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < codepoints.len() {
        match codepoints[i] {
            cp if cp == '\r' as u32 => {
                paragraphs.push((start, i));
                i += 1;
                if i < codepoints.len() && codepoints[i] == '\n' as u32 {
                    i += 1;
                }
                start = i;
            }
            cp if cp == '\n' as u32 => {
                paragraphs.push((start, i));
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    paragraphs.push((start, codepoints.len()));
    paragraphs
}

/// Style index covering codepoint `position`: the first run end-offset
/// greater than it.
fn style_at(runs: &[u32], position: usize) -> u16 {
    for (style, &end) in runs.iter().enumerate() {
        if (position as u32) < end {
            return style as u16;
        }
    }
    (runs.len().saturating_sub(1)) as u16
}

struct BidiLevels {
    /// Embedding level per codepoint.
    levels: Vec<u8>,
    /// Paragraph base level per codepoint.
    base_levels: Vec<u8>,
}

fn bidi_levels(chars: &[char], direction: TextDirection) -> BidiLevels {
    let text: String = chars.iter().collect();
    let default_level = match direction {
        TextDirection::LeftToRight => None,
        TextDirection::RightToLeft => Some(Level::rtl()),
    };
    let info = BidiInfo::new(&text, default_level);

    let fallback = match direction {
        TextDirection::LeftToRight => 0,
        TextDirection::RightToLeft => 1,
    };

    let mut levels = Vec::with_capacity(chars.len());
    let mut base_levels = Vec::with_capacity(chars.len());
    for (byte, _) in text.char_indices() {
        levels.push(info.levels[byte].number());
        let base = info
            .paragraphs
            .iter()
            .find(|p| p.range.contains(&byte))
            .map(|p| p.level.number())
            .unwrap_or(fallback);
        base_levels.push(base);
    }

    BidiLevels {
        levels,
        base_levels,
    }
}

/// Lay out `block` against `fonts`, wrapping lines at `max_width` pixels.
/// Pass `f32::INFINITY` to disable wrapping.
///
/// Panics on violated input invariants: mismatched `runs`/`fonts` lengths,
/// style runs not covering the codepoints, or out-of-range font indices.
/// These are programmer errors.
pub fn layout_text(block: &TextBlock, fonts: &[Font], max_width: f32) -> TextLayout {
    assert_eq!(
        block.runs.len(),
        block.fonts.len(),
        "style runs and fonts must pair up"
    );
    assert!(
        block.codepoints.len() <= (1 << 31),
        "codepoint count exceeds 2^31"
    );
    if !block.runs.is_empty() {
        assert_eq!(
            *block.runs.last().unwrap() as usize,
            block.codepoints.len(),
            "style runs must cover all codepoints"
        );
    }
    for style in &block.fonts {
        assert!(style.font < fonts.len(), "font index out of range");
    }

    let mut layout = TextLayout {
        max_width,
        ..Default::default()
    };

    // there's no layout to perform without a font
    if fonts.is_empty() || block.fonts.is_empty() {
        return layout;
    }

    let chars: Vec<char> = block
        .codepoints
        .iter()
        .map(|&cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();

    let paragraphs = split_paragraphs(&block.codepoints);
    let bidi = bidi_levels(&chars, block.direction);

    // per-codepoint segmentation: style, script with inherited/common
    // propagation, paragraph flags, break opportunities
    let mut segments = Vec::with_capacity(chars.len());
    let mut inherited = None;
    for (i, &ch) in chars.iter().enumerate() {
        let mut script = ch.script();
        match script {
            Script::Common | Script::Inherited | Script::Unknown => {
                if let Some(prev) = inherited {
                    script = prev;
                }
            }
            real => inherited = Some(real),
        }

        segments.push(TextSegment {
            style: style_at(&block.runs, i),
            script,
            paragraph_begin: false,
            paragraph_end: false,
            breakable: false,
            level: bidi.levels[i],
            base_level: bidi.base_levels[i],
        });
    }

    for &(start, end) in &paragraphs {
        if start == end {
            continue;
        }
        segments[start].paragraph_begin = true;
        segments[end - 1].paragraph_end = true;
        for i in start..end {
            segments[i].breakable = !is_word_space(block.codepoints[i])
                && (i == start || is_word_space(block.codepoints[i - 1]));
        }
    }

    let language: Option<rustybuzz::Language> = if block.language.is_empty() {
        None
    } else {
        block.language.parse().ok()
    };

    let mut features: SmallVec<[rustybuzz::Feature; 4]> = SmallVec::new();
    features.push(rustybuzz::Feature::new(
        rustybuzz::ttf_parser::Tag::from_bytes(b"kern"),
        block.use_kerning as u32,
        ..,
    ));
    features.push(rustybuzz::Feature::new(
        rustybuzz::ttf_parser::Tag::from_bytes(b"liga"),
        block.use_ligatures as u32,
        ..,
    ));
    features.push(rustybuzz::Feature::new(
        rustybuzz::ttf_parser::Tag::from_bytes(b"clig"),
        block.use_ligatures as u32,
        ..,
    ));

    for &(par_start, par_end) in &paragraphs {
        let par_first_run = layout.runs.len();
        let base_level = if par_start < segments.len() {
            segments[par_start].base_level
        } else {
            match block.direction {
                TextDirection::LeftToRight => 0,
                TextDirection::RightToLeft => 1,
            }
        };

        // run building: split at style/script/level boundaries and at
        // break opportunities, shape each run as a unit
        let mut i = par_start;
        while i < par_end {
            let first = i;
            let seg = segments[first];
            i += 1;
            while i < par_end {
                let next = segments[i];
                if next.style != seg.style
                    || next.script != seg.script
                    || next.level != seg.level
                    || next.breakable
                {
                    break;
                }
                i += 1;
            }

            let style = &block.fonts[seg.style as usize];
            let font = &fonts[style.font];
            shape_run(
                &mut layout,
                block,
                &chars[first..i],
                first,
                seg,
                style,
                font,
                base_level,
                first == par_start,
                language.as_ref(),
                &features,
            );
        }

        break_lines(
            &mut layout,
            block,
            fonts,
            par_first_run,
            par_start,
            base_level,
            max_width,
        );
    }

    // visual reordering (UAX #9 L1-L2) per line, then the block extent
    for line in &layout.lines {
        let first = line.first_run as usize;
        let runs = &mut layout.runs[first..first + line.num_runs as usize];
        reorder_visual(runs);
    }

    for line in &layout.lines {
        layout.extent.x = layout.extent.x.max(line.metrics.width);
        layout.extent.y += line.metrics.height;
    }

    layout
}

#[allow(clippy::too_many_arguments)]
fn shape_run(
    layout: &mut TextLayout,
    block: &TextBlock,
    chars: &[char],
    first: usize,
    seg: TextSegment,
    style: &FontStyle,
    font: &Font,
    base_level: u8,
    begins_paragraph: bool,
    language: Option<&rustybuzz::Language>,
    features: &[rustybuzz::Feature],
) {
    let mut buffer = rustybuzz::UnicodeBuffer::new();
    for (offset, &ch) in chars.iter().enumerate() {
        buffer.add(ch, (first + offset) as u32);
    }
    buffer.set_script(shaping_script(seg.script));
    buffer.set_direction(if seg.level % 2 == 0 {
        rustybuzz::Direction::LeftToRight
    } else {
        rustybuzz::Direction::RightToLeft
    });
    if let Some(language) = language {
        buffer.set_language(language.clone());
    }

    let glyphs = rustybuzz::shape(&font.face(), features, buffer);

    let first_glyph = layout.glyphs.len() as u32;
    let mut advance = 0i32;
    for (info, pos) in glyphs
        .glyph_infos()
        .iter()
        .zip(glyphs.glyph_positions().iter())
    {
        layout.glyphs.push(GlyphShape {
            glyph_id: info.glyph_id,
            cluster: info.cluster,
            advance: Vec2I::new(pos.x_advance, pos.y_advance),
            offset: Vec2I::new(pos.x_offset, pos.y_offset),
        });
        advance += pos.x_advance + style.letter_spacing;
    }

    let has_spacing = block.codepoints[first..first + chars.len()]
        .iter()
        .any(|&cp| is_word_space(cp));
    if has_spacing {
        advance += style.word_spacing;
    }

    layout.runs.push(TextRun {
        first: first as u32,
        count: chars.len() as u32,
        style: seg.style,
        font_height: style.font_height,
        line_height: style.line_height.max(1.0),
        upem: font.upem(),
        first_glyph,
        num_glyphs: layout.glyphs.len() as u32 - first_glyph,
        metrics: TextRunMetrics {
            advance,
            ascent: font.ascent(),
            descent: font.descent(),
        },
        level: seg.level,
        base_level,
        paragraph: begins_paragraph,
        breakable: seg.breakable,
    });
}

fn run_width_px(run: &TextRun) -> f32 {
    au_to_px(run.metrics.advance as f32, run.font_height, run.upem)
}

/// Greedy first-fit line breaking over the runs of one paragraph.
fn break_lines(
    layout: &mut TextLayout,
    block: &TextBlock,
    fonts: &[Font],
    par_first_run: usize,
    par_start: usize,
    base_level: u8,
    max_width: f32,
) {
    let par_end_run = layout.runs.len();

    if par_first_run == par_end_run {
        // empty paragraph: an empty line sized by the style at its offset
        let style_index = style_at(&block.runs, par_start);
        let style = &block.fonts[style_index as usize];
        let font = &fonts[style.font];
        let ascent = au_to_px(font.ascent() as f32, style.font_height, font.upem());
        let descent = au_to_px(font.descent() as f32, style.font_height, font.upem());
        layout.lines.push(Line {
            first: par_start as u32,
            count: 0,
            first_run: par_first_run as u32,
            num_runs: 0,
            metrics: LineMetrics {
                width: 0.0,
                height: style.line_height.max(1.0) * (ascent + descent),
                ascent,
                descent,
                level: base_level,
            },
            paragraph: true,
        });
        return;
    }

    let mut line_start = par_first_run;
    while line_start < par_end_run {
        let mut line_end = line_start + 1;
        let mut width = run_width_px(&layout.runs[line_start]);

        while line_end < par_end_run {
            let next = &layout.runs[line_end];
            let next_width = run_width_px(next);
            if next.breakable && width + next_width > max_width {
                break;
            }
            width += next_width;
            line_end += 1;
        }

        let runs = &layout.runs[line_start..line_end];
        let mut ascent = 0.0f32;
        let mut descent = 0.0f32;
        let mut height = 0.0f32;
        for run in runs {
            let run_ascent = au_to_px(run.metrics.ascent as f32, run.font_height, run.upem);
            let run_descent = au_to_px(run.metrics.descent as f32, run.font_height, run.upem);
            ascent = ascent.max(run_ascent);
            descent = descent.max(run_descent);
            height = height.max(run.line_height * (run_ascent + run_descent));
        }

        let first = runs[0].first;
        let last = runs.last().unwrap();
        layout.lines.push(Line {
            first,
            count: last.first + last.count - first,
            first_run: line_start as u32,
            num_runs: (line_end - line_start) as u32,
            metrics: LineMetrics {
                width,
                height,
                ascent,
                descent,
                level: base_level,
            },
            paragraph: line_start == par_first_run,
        });

        line_start = line_end;
    }
}

/// UAX #9 L2: for every level from the maximum down to 1, reverse each
/// maximal run subsequence at or above that level. Involutive.
fn reorder_visual(runs: &mut [TextRun]) {
    let Some(max_level) = runs.iter().map(|r| r.level).max() else {
        return;
    };

    for level in (1..=max_level).rev() {
        let mut start = 0;
        while start < runs.len() {
            if runs[start].level < level {
                start += 1;
                continue;
            }
            let mut end = start;
            while end < runs.len() && runs[end].level >= level {
                end += 1;
            }
            runs[start..end].reverse();
            start = end;
        }
    }
}
