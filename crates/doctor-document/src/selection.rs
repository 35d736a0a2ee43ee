//! Text selection handling.
//!
//! ## Offsets
//!
//! Selections are measured in characters over the whole document.
//! Every text block contributes its characters followed by one
//! virtual separator, so the end of one block and the start of the
//! next never share an offset.
//!
//! Ranges are half-open for character operations (`start..end`) but
//! block hit-testing uses [`Selection::touches`], which counts a
//! selection that merely touches a block's text.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A selection of text in the document.
///
/// The start is always before or equal to the end (normalized).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selection {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl Selection {
    /// Creates a new selection.
    ///
    /// Automatically normalizes so start <= end.
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Creates a zero-width selection (cursor position).
    pub fn cursor(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Returns true if this is a zero-width selection (just a cursor).
    pub fn is_cursor(&self) -> bool {
        self.start == self.end
    }

    /// Number of offsets covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the selection is empty.
    pub fn is_empty(&self) -> bool {
        self.is_cursor()
    }

    /// Returns true if an offset is within this selection.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Returns true if this selection overlaps another (half-open).
    pub fn overlaps(&self, other: &Selection) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Range-overlap test against an inclusive block span.
    ///
    /// Touching either edge of the span counts.
    pub fn touches(&self, span_start: usize, span_end: usize) -> bool {
        self.start <= span_end && span_start <= self.end
    }

    /// Returns the intersection with a half-open range.
    pub fn intersect(&self, range: Range<usize>) -> Option<Range<usize>> {
        let start = self.start.max(range.start);
        let end = self.end.min(range.end);
        (start < end).then_some(start..end)
    }

    /// Clamps both ends to `len`.
    pub fn clamp(&self, len: usize) -> Selection {
        Selection {
            start: self.start.min(len),
            end: self.end.min(len),
        }
    }

    /// Returns the selection as a half-open range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for Selection {
    fn from(range: Range<usize>) -> Self {
        Selection::new(range.start, range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_normalization() {
        let sel = Selection::new(10, 2);
        assert_eq!(sel.start, 2);
        assert_eq!(sel.end, 10);
        assert_eq!(sel.len(), 8);
    }

    #[test]
    fn test_cursor() {
        let sel = Selection::cursor(4);
        assert!(sel.is_cursor());
        assert!(!sel.contains(4));
    }

    #[test]
    fn test_touches_counts_edges() {
        let sel = Selection::new(5, 9);
        assert!(sel.touches(9, 20));
        assert!(sel.touches(0, 5));
        assert!(!sel.touches(10, 20));
    }

    #[test]
    fn test_intersect() {
        let sel = Selection::new(3, 8);
        assert_eq!(sel.intersect(5..12), Some(5..8));
        assert_eq!(sel.intersect(8..12), None);
    }
}
