//! Small shared utilities: source spans, error highlighting, and the debug
//! tracing macro.

use serde::Serialize;
use std::fmt::{self, Formatter};

/// A region of the source document. Spans are tracked from the document
/// reader all the way into errors, so that every user-facing error can point
/// at the text that caused it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Span {
    /// Byte offset of the start of the span
    pub offset: usize,
    /// Length of the span, in bytes
    pub length: usize,
    /// Line number of the start of the span, 1-based
    pub start_line: usize,
    /// Column number of the start of the span, 1-based
    pub start_col: usize,
}

impl Span {
    /// Build a span from a byte offset and length, computing the line/column
    /// position by scanning the source up to the offset.
    pub fn from_offset(src: &str, offset: usize, length: usize) -> Self {
        let offset = offset.min(src.len());
        let before = &src[..offset];
        let start_line = before.matches('\n').count() + 1;
        let start_col = match before.rfind('\n') {
            Some(i) => offset - i,
            None => offset + 1,
        };
        Self {
            offset,
            length,
            start_line,
            start_col,
        }
    }

    /// Get the slice of the source that this span points to.
    pub fn get_source_slice<'a>(&self, src: &'a str) -> &'a str {
        let end = (self.offset + self.length).min(src.len());
        &src[self.offset.min(end)..end]
    }
}

/// Write the source line containing the span, with a caret marker underneath
/// pointing at the start of the span. Used by the alternate (`{:#}`) error
/// format.
pub(crate) fn fmt_src_highlights(
    f: &mut Formatter<'_>,
    span: &Span,
    src: &str,
) -> fmt::Result {
    let line = match src.lines().nth(span.start_line.saturating_sub(1)) {
        Some(line) => line,
        None => return Ok(()),
    };
    writeln!(f)?;
    writeln!(f, "{}", line)?;
    write!(f, "{}^", " ".repeat(span.start_col.saturating_sub(1)))
}

/// Macro that can wrap any body, and only executes the body if we are running
/// in debug mode. Debug mode is enabled by setting the environment variable
/// DEBUG=true. This compiles away to nothing when --release is used.
///
/// Example:
/// ```
/// use semu::debug;
/// debug!(println!("Hello!"));
/// ```
#[macro_export]
macro_rules! debug {
    ($arg:expr) => {
        #[cfg(debug_assertions)]
        {
            if let Ok(debug_val) = std::env::var("DEBUG") {
                if debug_val.to_lowercase().as_str() == "true" {
                    $arg
                }
            }
        }
    };
}
