use tracing::debug;

use crate::types::{Page, TextStyle, Viewport};

use super::{validate_lines, LayoutError, LineMeasure, LineMetrics};

/// Splits `text` into pages whose accumulated line height fits
/// `viewport.height`. A page always holds at least one line, even when that
/// line alone is taller than the viewport.
pub fn paginate<M: LineMeasure + ?Sized>(
    text: &str,
    measure: &M,
    style: &TextStyle,
    viewport: Viewport,
) -> Result<Vec<Page>, LayoutError> {
    let lines = measure.measure(text, style, viewport.width)?;
    validate_lines(text, &lines)?;

    let mut pages = Vec::new();
    let mut start_line = 0usize;
    while start_line < lines.len() {
        let end_line = page_end_line(&lines, start_line, viewport.height);
        let start = lines[start_line].start;
        let end = lines[end_line].end;
        pages.push(Page {
            text: text[start..end].to_string(),
            start,
            end,
            first_line: start_line,
            line_count: end_line + 1 - start_line,
        });
        start_line = end_line + 1;
    }
    debug!(
        lines = lines.len(),
        pages = pages.len(),
        width = viewport.width,
        height = viewport.height,
        "paginated"
    );
    Ok(pages)
}

fn page_end_line(lines: &[LineMetrics], start_line: usize, budget: u32) -> usize {
    let mut height = 0u64;
    for (i, line) in lines.iter().enumerate().skip(start_line) {
        height += u64::from(line.height());
        if height > u64::from(budget) {
            return i.saturating_sub(1).max(start_line);
        }
    }
    lines.len() - 1
}
