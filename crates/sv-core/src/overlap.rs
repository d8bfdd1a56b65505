//! Overlap epochs: sample ranges where two or more ground-truth units fire
//! close enough together for their waveforms to superimpose.

use serde::Serialize;

use crate::train::TrainSet;

/// A normalized set of inclusive sample ranges.
///
/// Ranges are sorted and merged, so membership is a binary search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlapIntervals(Vec<(i64, i64)>);

impl OverlapIntervals {
    /// The empty set: no event is in overlap.
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Builds a set from arbitrary ranges. Inverted ranges are dropped;
    /// touching or overlapping ranges are merged.
    pub fn new(ranges: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let mut ranges: Vec<(i64, i64)> = ranges.into_iter().filter(|(s, e)| s <= e).collect();
        ranges.sort_unstable();

        let mut merged: Vec<(i64, i64)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        Self(merged)
    }

    /// Detects overlap epochs in a ground-truth set.
    ///
    /// Every event covers `[t - window, t + window]`. Wherever the covers of
    /// events from two different units intersect, that intersection is an
    /// overlap epoch.
    pub fn detect(ground_truth: &TrainSet, window: i64) -> Self {
        let pooled = ground_truth.pooled();
        let mut ranges = Vec::new();

        for (i, &(t, unit)) in pooled.iter().enumerate() {
            for &(other, other_unit) in &pooled[i + 1..] {
                if other.saturating_sub(t) > window.saturating_mul(2) {
                    break;
                }
                if other_unit != unit {
                    ranges.push((other.saturating_sub(window), t.saturating_add(window)));
                }
            }
        }

        let intervals = Self::new(ranges);
        tracing::debug!(
            epochs = intervals.len(),
            window,
            "detected overlap epochs in ground truth"
        );
        intervals
    }

    pub fn contains(&self, sample: i64) -> bool {
        let idx = self.0.partition_point(|&(start, _)| start <= sample);
        idx > 0 && self.0[idx - 1].1 >= sample
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[(i64, i64)] {
        &self.0
    }
}
