//! Tolerance-bounded event matching.
//!
//! Two sorted trains are swept with one pointer each. Every event of both
//! trains ends up in exactly one [`MatchRecord`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::overlap::OverlapIntervals;
use crate::params::ConfigError;
use crate::train::EventTrain;

/// Outcome for one ground-truth event, one estimated event, or a pair.
///
/// Indices refer to positions in the sorted input sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRecord {
    /// A ground-truth event and an estimated event within tolerance.
    Matched {
        gt_index: usize,
        ev_index: usize,
        gt_sample: i64,
        ev_sample: i64,
    },
    /// A ground-truth event with no estimated partner.
    Missed { gt_index: usize, gt_sample: i64 },
    /// An estimated event with no ground-truth partner.
    Spurious { ev_index: usize, ev_sample: i64 },
}

/// Classification of a match record with overlap subtyping applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchCategory {
    /// True positive.
    Tp,
    /// True positive inside an overlap epoch.
    Tpo,
    /// False negative.
    Fn,
    /// False negative inside an overlap epoch.
    Fno,
    /// False positive.
    Fp,
}

impl MatchRecord {
    /// Timestamp used to decide overlap membership: the ground-truth event
    /// when there is one, otherwise the estimated event.
    pub const fn reference_sample(&self) -> i64 {
        match *self {
            Self::Matched { gt_sample, .. } | Self::Missed { gt_sample, .. } => gt_sample,
            Self::Spurious { ev_sample, .. } => ev_sample,
        }
    }

    pub fn in_overlap(&self, overlaps: &OverlapIntervals) -> bool {
        overlaps.contains(self.reference_sample())
    }

    pub fn category(&self, overlaps: &OverlapIntervals) -> MatchCategory {
        let overlapping = self.in_overlap(overlaps);
        match (self, overlapping) {
            (Self::Matched { .. }, false) => MatchCategory::Tp,
            (Self::Matched { .. }, true) => MatchCategory::Tpo,
            (Self::Missed { .. }, false) => MatchCategory::Fn,
            (Self::Missed { .. }, true) => MatchCategory::Fno,
            (Self::Spurious { .. }, _) => MatchCategory::Fp,
        }
    }
}

/// Matches two trains under `tolerance`.
///
/// See [`sweep`] for the pairing rules.
pub fn match_trains(
    ground_truth: &EventTrain,
    estimated: &EventTrain,
    tolerance: i64,
) -> Result<Vec<MatchRecord>, ConfigError> {
    if tolerance < 0 {
        return Err(ConfigError::Negative {
            field: "tolerance",
            value: tolerance,
        });
    }
    Ok(sweep(ground_truth.as_slice(), estimated.as_slice(), tolerance))
}

/// Greedy two-pointer matching over sorted sample slices.
///
/// Each ground-truth event `g` is paired with the closest estimated event in
/// `[g - tolerance, g + tolerance]` that is still unpaired, the earliest one
/// on ties. Candidates passed over by that choice stay eligible for the next
/// ground-truth events and become spurious once they fall behind the window.
/// A ground-truth event without a candidate is missed.
///
/// Callers must pass sorted slices and a non-negative tolerance.
pub(crate) fn sweep(gt: &[i64], ev: &[i64], tolerance: i64) -> Vec<MatchRecord> {
    let mut records = Vec::with_capacity(gt.len() + ev.len());
    // Unpaired candidates of earlier ground-truth events, in index order.
    let mut pending: VecDeque<usize> = VecDeque::new();
    let mut j = 0;

    for (gt_index, &g) in gt.iter().enumerate() {
        let low = g.saturating_sub(tolerance);
        let high = g.saturating_add(tolerance);

        while let Some(&k) = pending.front().filter(|&&k| ev[k] < low) {
            records.push(spurious(ev, k));
            pending.pop_front();
        }
        while j < ev.len() && ev[j] < low {
            records.push(spurious(ev, j));
            j += 1;
        }
        while j < ev.len() && ev[j] <= high {
            pending.push_back(j);
            j += 1;
        }

        let closest = pending
            .iter()
            .enumerate()
            .min_by_key(|&(_, &k)| ev[k].abs_diff(g))
            .map(|(position, _)| position);
        match closest.and_then(|position| pending.remove(position)) {
            Some(ev_index) => records.push(MatchRecord::Matched {
                gt_index,
                ev_index,
                gt_sample: g,
                ev_sample: ev[ev_index],
            }),
            None => records.push(MatchRecord::Missed {
                gt_index,
                gt_sample: g,
            }),
        }
    }

    records.extend(pending.into_iter().map(|k| spurious(ev, k)));
    records.extend((j..ev.len()).map(|k| spurious(ev, k)));
    records
}

const fn spurious(ev: &[i64], ev_index: usize) -> MatchRecord {
    MatchRecord::Spurious {
        ev_index,
        ev_sample: ev[ev_index],
    }
}
