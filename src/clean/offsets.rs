//! Offset-tracked working text for the cleaning passes.
//! Several passes shrink (or grow) the string; removed spans must still be
//! reported against the original input, so every edit goes through a
//! byte-level translation table instead of re-indexing mutated text.

use std::ops::Range;

/// A mutable string paired with a map from each current byte back to the
/// original byte offset it came from. Inserted bytes inherit the original
/// offset of the position they were inserted at.
#[derive(Debug, Clone)]
pub struct TrackedText {
    text: String,
    orig: Vec<usize>,
    original_len: usize,
}

impl TrackedText {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            orig: (0..text.len()).collect(),
            original_len: text.len(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Map a current byte range back to original byte offsets.
    pub fn original_range(&self, range: Range<usize>) -> (usize, usize) {
        if range.is_empty() {
            let at = self.origin_at(range.start);
            return (at, at);
        }
        let start = self.orig[range.start];
        let end = self.orig[range.end - 1] + 1;
        (start, end)
    }

    fn origin_at(&self, at: usize) -> usize {
        self.orig.get(at).copied().unwrap_or(self.original_len)
    }

    /// Remove a byte range. `range` must lie on char boundaries.
    pub fn remove(&mut self, range: Range<usize>) {
        self.text.replace_range(range.clone(), "");
        self.orig.drain(range);
    }

    /// Replace a byte range with `with`. Replacement bytes map to the
    /// original offset of the range start.
    pub fn replace(&mut self, range: Range<usize>, with: &str) {
        let at = self.origin_at(range.start);
        self.text.replace_range(range.clone(), with);
        self.orig
            .splice(range, std::iter::repeat(at).take(with.len()));
    }

    /// Insert `s` at a byte position on a char boundary.
    pub fn insert(&mut self, at: usize, s: &str) {
        let origin = self.origin_at(at);
        self.text.insert_str(at, s);
        self.orig
            .splice(at..at, std::iter::repeat(origin).take(s.len()));
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
