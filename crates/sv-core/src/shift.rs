//! Shift estimation.
//!
//! Sorters report spikes with a systematic latency relative to the ground
//! truth (detection on the trough instead of the onset, filter delays, ...).
//! Before matching, the estimated trains are moved by the offset that makes
//! the most estimated events coincide with ground-truth events.
//!
//! # Scoring
//!
//! For a candidate offset `d`, an estimated event `e` is a hit when `e + d`
//! lies within `window` samples of some ground-truth event. Candidates are
//! ranked by:
//!
//! 1. most hits
//! 2. smallest summed distance of the hits to their nearest ground-truth event
//! 3. smallest `|d|`
//! 4. positive before negative

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::params::ConfigError;
use crate::train::{TrainSet, UnitId};

/// Default coincidence window for scoring shift candidates, in samples.
pub const DEFAULT_SHIFT_WINDOW: i64 = 2;

/// Offset applied to the estimated trains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    /// One offset for all estimated units.
    Global(i64),
    /// One offset per estimated unit.
    PerUnit(BTreeMap<UnitId, i64>),
}

impl Shift {
    /// The offset applied to `unit`.
    pub fn offset_for(&self, unit: &UnitId) -> i64 {
        match self {
            Self::Global(offset) => *offset,
            Self::PerUnit(offsets) => offsets.get(unit).copied().unwrap_or(0),
        }
    }

    /// True when no event is moved.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Global(offset) => *offset == 0,
            Self::PerUnit(offsets) => offsets.values().all(|&o| o == 0),
        }
    }

    pub fn apply(&self, estimated: &TrainSet) -> TrainSet {
        match self {
            Self::Global(offset) => estimated.shifted(*offset),
            Self::PerUnit(offsets) => estimated.shifted_per_unit(offsets),
        }
    }
}

/// Result of a shift search: the chosen shift and the corrected estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftEstimate {
    pub shift: Shift,
    pub corrected: TrainSet,
}

/// Score of one candidate offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    offset: i64,
    hits: usize,
    residual: i64,
}

impl Candidate {
    /// Orders candidates so that the preferred one is the greatest.
    fn rank(&self, other: &Self) -> Ordering {
        self.hits
            .cmp(&other.hits)
            .then_with(|| other.residual.cmp(&self.residual))
            .then_with(|| other.offset.abs().cmp(&self.offset.abs()))
            .then_with(|| self.offset.cmp(&other.offset))
    }
}

/// Estimates one global offset for the whole estimated set.
///
/// All ground-truth units are pooled and all estimated units are pooled, so
/// the score sums over every unit pairing. An empty estimate (or an empty
/// ground truth) yields a zero shift and an unchanged copy of the input.
pub fn estimate_shift(
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    max_shift: i64,
    window: i64,
) -> Result<ShiftEstimate, ConfigError> {
    check_bounds(max_shift, window)?;

    if estimated.has_no_events() || ground_truth.has_no_events() {
        tracing::debug!("nothing to align, using zero shift");
        return Ok(ShiftEstimate {
            shift: Shift::Global(0),
            corrected: estimated.clone(),
        });
    }

    let reference: Vec<i64> = ground_truth.pooled().into_iter().map(|(t, _)| t).collect();
    let events: Vec<i64> = estimated.pooled().into_iter().map(|(t, _)| t).collect();

    let best = best_offset(&reference, &events, max_shift, window);
    tracing::debug!(
        offset = best.offset,
        hits = best.hits,
        events = events.len(),
        "estimated global shift"
    );

    Ok(ShiftEstimate {
        shift: Shift::Global(best.offset),
        corrected: estimated.shifted(best.offset),
    })
}

/// Estimates a separate offset for every estimated unit.
///
/// Each estimated unit is scored against each ground-truth unit on its own;
/// the best-scoring pairing decides the unit's offset. Units without events
/// keep offset 0.
pub fn estimate_unit_shifts(
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    max_shift: i64,
    window: i64,
) -> Result<ShiftEstimate, ConfigError> {
    check_bounds(max_shift, window)?;

    let mut offsets = BTreeMap::new();
    for (unit, train) in estimated {
        let best = ground_truth
            .iter()
            .filter(|(_, reference)| !reference.is_empty() && !train.is_empty())
            .map(|(_, reference)| {
                best_offset(reference.as_slice(), train.as_slice(), max_shift, window)
            })
            .max_by(Candidate::rank);

        let offset = best.map_or(0, |c| c.offset);
        tracing::debug!(%unit, offset, "estimated unit shift");
        offsets.insert(unit.clone(), offset);
    }

    let shift = Shift::PerUnit(offsets);
    let corrected = shift.apply(estimated);
    Ok(ShiftEstimate { shift, corrected })
}

const fn check_bounds(max_shift: i64, window: i64) -> Result<(), ConfigError> {
    if max_shift < 0 {
        return Err(ConfigError::Negative {
            field: "max_shift",
            value: max_shift,
        });
    }
    if window < 0 {
        return Err(ConfigError::Negative {
            field: "shift_window",
            value: window,
        });
    }
    Ok(())
}

/// Scans `[-max_shift, max_shift]` and returns the preferred candidate.
///
/// Both slices must be sorted ascending and non-empty.
fn best_offset(reference: &[i64], events: &[i64], max_shift: i64, window: i64) -> Candidate {
    (-max_shift..=max_shift)
        .map(|offset| score(reference, events, offset, window))
        .max_by(Candidate::rank)
        .unwrap_or(Candidate {
            offset: 0,
            hits: 0,
            residual: 0,
        })
}

fn score(reference: &[i64], events: &[i64], offset: i64, window: i64) -> Candidate {
    let mut hits = 0;
    let mut residual: i64 = 0;
    for &event in events {
        let moved = event.saturating_add(offset);
        if let Some(distance) = nearest_distance(reference, moved).filter(|&d| d <= window) {
            hits += 1;
            residual = residual.saturating_add(distance);
        }
    }
    Candidate {
        offset,
        hits,
        residual,
    }
}

/// Distance from `sample` to the closest value in the sorted `reference`.
fn nearest_distance(reference: &[i64], sample: i64) -> Option<i64> {
    let idx = reference.partition_point(|&t| t < sample);
    let above = reference.get(idx).map(|&t| t.saturating_sub(sample));
    let below = idx
        .checked_sub(1)
        .and_then(|i| reference.get(i))
        .map(|&t| sample.saturating_sub(t));
    match (above, below) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
