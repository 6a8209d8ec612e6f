//! Offset to line/column lookup.
//!
//! The table holds the byte offset at which every line starts. It is built
//! once per input, and only when a position actually has to be reported.

use memchr::memchr_iter;

use crate::error::SourceLocation;

/// Cumulative line-start offsets of one input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    /// Builds the line table for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut starts = Vec::with_capacity(text.len() / 32 + 1);
        starts.push(0);
        starts.extend(memchr_iter(b'\n', text.as_bytes()).map(|pos| pos + 1));
        Self { starts }
    }

    /// Returns the number of lines (a trailing newline opens an empty line).
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Resolves a byte offset of `text` to a 1-based line and column.
    ///
    /// Offsets past the end are clamped to the end of the text. The column
    /// counts characters, falling back to bytes when `offset` does not sit
    /// on a character boundary.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn location(&self, text: &str, offset: usize) -> SourceLocation {
        let offset = offset.min(text.len());
        let line = self.starts.partition_point(|&start| start <= offset);
        let line_start = self.starts[line.saturating_sub(1)];
        let column = text
            .get(line_start..offset)
            .map_or(offset - line_start, |prefix| prefix.chars().count());
        SourceLocation {
            line: line as u32,
            column: column as u32 + 1,
            byte_offset: offset,
        }
    }
}
