use thiserror::Error;

use crate::types::TextStyle;

mod monospace;
mod paginate;

pub use monospace::MonospaceMeasure;
pub use paginate::paginate;

/// One laid-out line as reported by a [`LineMeasure`]. `start..end` are byte
/// offsets into the measured text; `top`/`bottom` are vertical extents in
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMetrics {
    pub start: usize,
    pub end: usize,
    pub top: u32,
    pub bottom: u32,
}

impl LineMetrics {
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("text could not be laid out: {0}")]
    Measure(String),
    #[error("line {index} is invalid: {reason}")]
    InvalidLines { index: usize, reason: &'static str },
    #[error("layout produced no lines for {0} bytes of text")]
    NoLines(usize),
}

/// Line-metrics oracle. Pagination is only as accurate as this measurement:
/// it must wrap text exactly the way the renderer will draw it.
pub trait LineMeasure {
    fn measure(
        &self,
        text: &str,
        style: &TextStyle,
        wrap_width: u32,
    ) -> Result<Vec<LineMetrics>, LayoutError>;
}

impl<T: LineMeasure + ?Sized> LineMeasure for &T {
    fn measure(
        &self,
        text: &str,
        style: &TextStyle,
        wrap_width: u32,
    ) -> Result<Vec<LineMetrics>, LayoutError> {
        (**self).measure(text, style, wrap_width)
    }
}

impl<T: LineMeasure + ?Sized> LineMeasure for std::sync::Arc<T> {
    fn measure(
        &self,
        text: &str,
        style: &TextStyle,
        wrap_width: u32,
    ) -> Result<Vec<LineMetrics>, LayoutError> {
        (**self).measure(text, style, wrap_width)
    }
}

/// Checks that `lines` tile `text` exactly: in order, without gaps, on char
/// boundaries. Only empty text may have an empty line.
pub(crate) fn validate_lines(text: &str, lines: &[LineMetrics]) -> Result<(), LayoutError> {
    if lines.is_empty() {
        return if text.is_empty() {
            Ok(())
        } else {
            Err(LayoutError::NoLines(text.len()))
        };
    }
    let mut expected_start = 0usize;
    for (index, line) in lines.iter().enumerate() {
        if line.start != expected_start {
            return Err(LayoutError::InvalidLines {
                index,
                reason: "does not start where the previous line ended",
            });
        }
        if line.end < line.start || line.end > text.len() {
            return Err(LayoutError::InvalidLines {
                index,
                reason: "end is out of range",
            });
        }
        if line.end == line.start && !text.is_empty() {
            return Err(LayoutError::InvalidLines {
                index,
                reason: "line is empty",
            });
        }
        if !text.is_char_boundary(line.end) {
            return Err(LayoutError::InvalidLines {
                index,
                reason: "end splits a character",
            });
        }
        if line.bottom < line.top {
            return Err(LayoutError::InvalidLines {
                index,
                reason: "bottom is above top",
            });
        }
        expected_start = line.end;
    }
    if expected_start != text.len() {
        return Err(LayoutError::InvalidLines {
            index: lines.len() - 1,
            reason: "lines stop before the end of the text",
        });
    }
    Ok(())
}
