//! Page-marker convention shared by loaders and the chunker.
//!
//! Loaders prefix every page of extracted text with `--- Page N ---`. The
//! chunker never sees page boundaries any other way, so a loader that changes
//! this format silently degrades every chunk to page 0. Bump
//! [`PAGE_MARKER_VERSION`] whenever the rendered form changes.

use regex::Regex;
use std::sync::LazyLock;

pub const PAGE_MARKER_VERSION: u32 = 1;

#[allow(clippy::unwrap_used)]
static PAGE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--- Page (\d+) ---").unwrap());

/// Render the marker for 1-based page `n`.
pub fn page_marker(n: u32) -> String {
    format!("--- Page {n} ---")
}

/// A marker found in a text: its character span `[offset, end)` and the page
/// it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMarker {
    pub offset: usize,
    pub end: usize,
    pub page: u32,
}

/// Every marker of one document, ordered by offset.
#[derive(Debug, Clone, Default)]
pub struct PageMarkers {
    markers: Vec<PageMarker>,
}

impl PageMarkers {
    pub fn scan(text: &str) -> Self {
        let mut markers = Vec::new();
        let mut byte_cursor = 0usize;
        let mut char_cursor = 0usize;
        for caps in PAGE_MARKER.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            // Page numbers too large for u32 are not markers we produced.
            let Some(page) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else { continue };
            char_cursor += text[byte_cursor..whole.start()].chars().count();
            byte_cursor = whole.start();
            let end = char_cursor + whole.as_str().chars().count();
            markers.push(PageMarker { offset: char_cursor, end, page });
        }
        Self { markers }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Page for the char span `[start, end)`: the first marker lying wholly
    /// inside the span, else the last marker starting before `start`, else
    /// `None`. A marker cut off by `end` does not count.
    pub fn resolve(&self, start: usize, end: usize) -> Option<u32> {
        // Index of the first marker at or after `start`.
        let first_at_or_after = self.markers.partition_point(|m| m.offset < start);
        if let Some(inside) = self.markers.get(first_at_or_after) {
            if inside.end <= end {
                return Some(inside.page);
            }
        }
        first_at_or_after
            .checked_sub(1)
            .and_then(|i| self.markers.get(i))
            .map(|m| m.page)
    }
}
