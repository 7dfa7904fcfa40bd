//! Hit testing: pixel positions back to clusters.

use vellum_core::Vec2;

use crate::layout::{au_to_px, TextLayout};

/// Result of a hit test.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextHit {
    /// Codepoint index of the hit.
    pub cluster: u32,
    /// Line index.
    pub line: u32,
    /// Cluster offset within the line.
    pub column: u32,
}

/// Map a block-local pixel position to the nearest cluster.
///
/// The vertical axis clamps to the first/last line; a position past the end
/// of a line clamps to its last column. An empty layout hits the origin.
pub fn hit_text(layout: &TextLayout, pos: Vec2) -> TextHit {
    if layout.lines.is_empty() {
        return TextHit::default();
    }

    // vertical clamp selects the line
    let mut line_index = layout.lines.len() - 1;
    let mut line_y = 0.0f32;
    for (i, line) in layout.lines.iter().enumerate() {
        line_y += line.metrics.height;
        if pos.y < line_y {
            line_index = i;
            break;
        }
    }

    let line = &layout.lines[line_index];
    let mut cursor = 0.0f32;

    for run in &layout.runs
        [line.first_run as usize..(line.first_run + line.num_runs) as usize]
    {
        let run_width = au_to_px(run.metrics.advance as f32, run.font_height, run.upem);
        if pos.x >= cursor + run_width {
            cursor += run_width;
            continue;
        }

        // horizontal scan within the run's glyphs
        let mut glyph_cursor = cursor;
        for glyph in &layout.glyphs
            [run.first_glyph as usize..(run.first_glyph + run.num_glyphs) as usize]
        {
            let advance = au_to_px(glyph.advance.x as f32, run.font_height, run.upem);
            if pos.x < glyph_cursor + advance {
                return TextHit {
                    cluster: glyph.cluster,
                    line: line_index as u32,
                    column: glyph.cluster.saturating_sub(line.first),
                };
            }
            glyph_cursor += advance;
        }

        // between the last glyph and the run edge
        let cluster = run.first + run.count.saturating_sub(1);
        return TextHit {
            cluster,
            line: line_index as u32,
            column: cluster.saturating_sub(line.first),
        };
    }

    // past the end of the line
    TextHit {
        cluster: line.first + line.count,
        line: line_index as u32,
        column: line.count,
    }
}
