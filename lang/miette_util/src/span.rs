use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// The raw, untyped index. We use a 32-bit integer here for space efficiency,
/// assuming we won't be working with sources larger than 4GB.
pub type RawIndex = u32;

/// A byte position in a source file.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ByteIndex(pub RawIndex);

impl ByteIndex {
    /// Convert the position into a `usize`, for use in array indexing
    pub const fn to_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ByteIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ByteIndex({})", self.0)
    }
}

impl fmt::Display for ByteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A region of a source file, `start` inclusive and `end` exclusive.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize,
)]
pub struct Span {
    pub start: ByteIndex,
    pub end: ByteIndex,
}

impl Span {
    pub fn new(start: RawIndex, end: RawIndex) -> Span {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Span { start: ByteIndex(start), end: ByteIndex(end) }
    }

    pub fn len(self) -> usize {
        (self.end.0 - self.start.0) as usize
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Zero-based line and character of the start of this span in `source`.
    ///
    /// Positions past the end of `source` are clamped to its end.
    pub fn line_col(self, source: &str) -> (usize, usize) {
        let offset = self.start.to_usize().min(source.len());
        let before = &source.as_bytes()[..offset];
        let line = before.iter().filter(|b| **b == b'\n').count();
        let line_start = before.iter().rposition(|b| *b == b'\n').map(|i| i + 1).unwrap_or(0);
        (line, offset - line_start)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_col_counts_newlines() {
        let source = "let x = 1;\nlet y = 2;\n  foo();";
        assert_eq!(Span::new(0, 3).line_col(source), (0, 0));
        assert_eq!(Span::new(15, 16).line_col(source), (1, 4));
        assert_eq!(Span::new(24, 27).line_col(source), (2, 2));
    }

    #[test]
    fn line_col_clamps_past_end() {
        assert_eq!(Span::new(100, 101).line_col("ab\nc"), (1, 1));
    }

    #[test]
    fn new_orders_bounds() {
        assert_eq!(Span::new(5, 2), Span::new(2, 5));
    }
}
