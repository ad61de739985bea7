//! Detection of segments whose declared tracking windows intersect.
//!
//! Overlap is reported only; output points are never adjusted because of it.

use crate::TimeWindow;

/// Closed-interval test: windows that touch at an endpoint overlap.
pub fn overlaps(a: &TimeWindow, b: &TimeWindow) -> bool {
    a.start() <= b.end() && b.start() <= a.end()
}

/// Index pairs `(i, j)` with `i < j` whose windows overlap.
pub fn overlapping_pairs(windows: &[TimeWindow]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, a) in windows.iter().enumerate() {
        for (offset, b) in windows[i + 1..].iter().enumerate() {
            if overlaps(a, b) {
                pairs.push((i, i + 1 + offset));
            }
        }
    }
    pairs
}

pub fn any_overlap(windows: &[TimeWindow]) -> bool {
    windows
        .iter()
        .enumerate()
        .any(|(i, a)| windows[i + 1..].iter().any(|b| overlaps(a, b)))
}
