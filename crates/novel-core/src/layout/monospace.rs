use unicode_linebreak::{linebreaks, BreakOpportunity};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::types::TextStyle;

use super::{LayoutError, LineMeasure, LineMetrics};

/// Cell-grid line measurement: a narrow glyph takes one cell of
/// `ceil(font_px / 2)` pixels, East-Asian wide glyphs take two. Lines wrap at
/// Unicode break opportunities and trailing whitespace may hang past the
/// right edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasure;

impl MonospaceMeasure {
    pub fn cell_width(&self, style: &TextStyle) -> u32 {
        style.font_px.div_ceil(2).max(1)
    }

    pub fn columns(&self, style: &TextStyle, wrap_width: u32) -> usize {
        (wrap_width / self.cell_width(style)).max(1) as usize
    }

    pub fn line_height(&self, style: &TextStyle) -> u32 {
        ((style.font_px as f32 * style.line_spacing).round() as u32).max(1)
    }
}

impl LineMeasure for MonospaceMeasure {
    fn measure(
        &self,
        text: &str,
        style: &TextStyle,
        wrap_width: u32,
    ) -> Result<Vec<LineMetrics>, LayoutError> {
        let columns = self.columns(style, wrap_width);
        let line_height = self.line_height(style);
        let mut top = 0u32;
        let lines = wrap_ranges(text, columns)
            .into_iter()
            .map(|(start, end)| {
                let bottom = top.saturating_add(line_height);
                let line = LineMetrics {
                    start,
                    end,
                    top,
                    bottom,
                };
                top = bottom;
                line
            })
            .collect();
        Ok(lines)
    }
}

fn wrap_ranges(text: &str, columns: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    for hard_line in text.split_inclusive('\n') {
        wrap_hard_line(hard_line, offset, columns, &mut out);
        offset += hard_line.len();
    }
    if out.is_empty() {
        out.push((0, 0));
    }
    out
}

// The terminating newline stays on the line it ends.
fn wrap_hard_line(line: &str, base: usize, columns: usize, out: &mut Vec<(usize, usize)>) {
    let content = line.strip_suffix('\n').unwrap_or(line);
    if content.is_empty() {
        out.push((base, base + line.len()));
        return;
    }

    let mut line_start = 0usize;
    let mut used = 0usize;
    let mut seg_start = 0usize;
    for (idx, opp) in linebreaks(content) {
        let segment = &content[seg_start..idx];
        let visible = segment.trim_end().width();
        if used > 0 && used + visible > columns {
            out.push((base + line_start, base + seg_start));
            line_start = seg_start;
            used = 0;
        }
        if used == 0 && visible > columns {
            // No break opportunity fits: split on grapheme boundaries.
            for (g_idx, grapheme) in segment.grapheme_indices(true) {
                let w = grapheme.width();
                let at = seg_start + g_idx;
                let hangs = grapheme.trim().is_empty();
                if used > 0 && used + w > columns && !hangs {
                    out.push((base + line_start, base + at));
                    line_start = at;
                    used = 0;
                }
                used += w;
            }
        } else {
            used += segment.width();
        }
        if matches!(opp, BreakOpportunity::Mandatory) && idx < content.len() {
            out.push((base + line_start, base + idx));
            line_start = idx;
            used = 0;
        }
        seg_start = idx;
    }
    out.push((base + line_start, base + line.len()));
}
