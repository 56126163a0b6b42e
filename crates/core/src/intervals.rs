//! Anti-cheat watched-interval merging.
//!
//! Only time ranges the client explicitly reported as played count toward
//! watch progress. Seeking forward leaves a gap between intervals, and gaps
//! are never counted — merging the union of reported intervals defeats
//! "scrub to the end" without server-side playback verification.

use serde::{Deserialize, Serialize};

/// A half-open watched range `[start, end)` in seconds from the video start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Length of the interval in seconds; zero for inverted ranges.
    #[must_use]
    pub fn secs(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// Merge overlapping or adjacent intervals into a canonical sorted set.
///
/// The result is sorted by start, non-overlapping, and independent of input
/// order. Merging is idempotent: feeding the output back in returns the same
/// set. Inverted intervals (`end < start`) are dropped.
#[must_use]
pub fn merge(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = intervals.iter().copied().filter(|iv| iv.end >= iv.start).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by_key(|iv| (iv.start, iv.end));

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for iv in sorted {
        match merged.last_mut() {
            Some(run) if iv.start <= run.end => {
                run.end = run.end.max(iv.end);
            }
            _ => merged.push(iv),
        }
    }
    merged
}

/// Merge previously stored intervals with a newly reported batch.
#[must_use]
pub fn merge_with(existing: &[Interval], reported: &[Interval]) -> Vec<Interval> {
    let mut all = Vec::with_capacity(existing.len() + reported.len());
    all.extend_from_slice(existing);
    all.extend_from_slice(reported);
    merge(&all)
}

/// Total covered seconds over a merged interval set.
#[must_use]
pub fn total_secs(merged: &[Interval]) -> u32 {
    merged.iter().map(Interval::secs).sum()
}
