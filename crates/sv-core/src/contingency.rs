//! Contingency construction and per-unit classification.
//!
//! All ground-truth events and all estimated events are pooled and matched in
//! a single sweep, so every estimated event is paired with at most one
//! ground-truth event across all units. The pairs are then grouped by
//! (ground-truth unit, estimated unit).
//!
//! Each ground-truth unit `i` is scored against its best estimated unit `b`,
//! the one sharing the most matched events with it. Overlap subtypes (the `O`
//! columns) use the ground-truth timestamp of an event, or the estimated
//! timestamp for unmatched estimated events.
//!
//! | column | meaning                                                    |
//! |--------|------------------------------------------------------------|
//! | KS     | events of `i`                                              |
//! | KSO    | events of `i` inside overlap epochs                        |
//! | FS     | events of `b`                                              |
//! | TP     | events of `i` matched by `b`                               |
//! | TPO    | same, inside overlap epochs                                |
//! | FPA    | events of `b` matched to a ground-truth unit other than `i`|
//! | FPAE   | events of `i` matched by an estimated unit other than `b`  |
//! | FPAO   | FPA inside overlap epochs                                  |
//! | FPAOE  | FPAE inside overlap epochs                                 |
//! | FN     | events of `i` matched by nothing                           |
//! | FNO    | same, inside overlap epochs                                |
//! | FP     | events of `b` matched to nothing                           |
//!
//! So `KS = TP + TPO + FPAE + FPAOE + FN + FNO` and
//! `FS = TP + TPO + FPA + FPAO + FP`.

use serde::{Deserialize, Serialize};

use crate::matching::{MatchCategory, MatchRecord, sweep};
use crate::overlap::OverlapIntervals;
use crate::params::ConfigError;
use crate::train::{TrainSet, UnitId};

/// Column names of a classification row, in table order.
pub const CLASSIFICATION_COLUMNS: [&str; 12] = [
    "KS", "KSO", "FS", "TP", "TPO", "FPA", "FPAE", "FPAO", "FPAOE", "FN", "FNO", "FP",
];

/// Matched-pair counts indexed by (ground-truth unit index, estimated unit index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyMatrix {
    rows: usize,
    cols: usize,
    counts: Vec<u64>,
}

impl ContingencyMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            counts: vec![0; rows * cols],
        }
    }

    /// Builds a matrix from nested rows. All rows must have equal length.
    pub fn from_rows(rows: &[Vec<u64>]) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        Some(Self {
            rows: rows.len(),
            cols,
            counts: rows.concat(),
        })
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.counts[row * self.cols + col]
    }

    fn increment(&mut self, row: usize, col: usize) {
        self.counts[row * self.cols + col] += 1;
    }

    /// Element-wise sum of two matrices of the same shape.
    fn added(&self, other: &Self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            counts: self
                .counts
                .iter()
                .zip(&other.counts)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }

    pub fn row(&self, row: usize) -> &[u64] {
        &self.counts[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_sum(&self, row: usize) -> u64 {
        self.row(row).iter().sum()
    }

    pub fn col_sum(&self, col: usize) -> u64 {
        (0..self.rows).map(|row| self.get(row, col)).sum()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Column with the highest count in `row`, lowest index on ties.
    /// `None` when the row is all zeros.
    pub fn best_col(&self, row: usize) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (col, &count) in self.row(row).iter().enumerate() {
            if count > 0 && best.is_none_or(|(_, top)| count > top) {
                best = Some((col, count));
            }
        }
        best.map(|(col, _)| col)
    }

    /// Nested row representation.
    pub fn to_rows(&self) -> Vec<Vec<u64>> {
        (0..self.rows).map(|row| self.row(row).to_vec()).collect()
    }
}

/// Classification counts for one ground-truth unit against its best unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct ClassificationCounts {
    pub ks: u64,
    pub kso: u64,
    pub fs: u64,
    pub tp: u64,
    pub tpo: u64,
    pub fpa: u64,
    pub fpae: u64,
    pub fpao: u64,
    pub fpaoe: u64,
    #[serde(rename = "FN")]
    pub fn_: u64,
    pub fno: u64,
    pub fp: u64,
}

impl ClassificationCounts {
    /// Counts in [`CLASSIFICATION_COLUMNS`] order.
    pub const fn values(&self) -> [u64; 12] {
        [
            self.ks, self.kso, self.fs, self.tp, self.tpo, self.fpa, self.fpae, self.fpao,
            self.fpaoe, self.fn_, self.fno, self.fp,
        ]
    }
}

/// One row of the classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub gt_unit: UnitId,
    /// Best-matching estimated unit; `None` when nothing matched.
    pub ev_unit: Option<UnitId>,
    #[serde(flatten)]
    pub counts: ClassificationCounts,
}

impl ClassificationRecord {
    /// Row label of the form `gt/ev`, with `-` for a missing estimated unit.
    pub fn label(&self) -> String {
        match &self.ev_unit {
            Some(ev) => format!("{}/{ev}", self.gt_unit),
            None => format!("{}/-", self.gt_unit),
        }
    }
}

/// Run-level totals over all events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub gt_events: u64,
    pub ev_events: u64,
    pub matched: u64,
    pub tp: u64,
    pub tpo: u64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub fno: u64,
    pub fpae: u64,
    pub fpaoe: u64,
}

impl EvaluationSummary {
    /// All ground-truth events that were not detected at all.
    pub const fn missed(&self) -> u64 {
        self.fn_ + self.fno
    }

    /// All ground-truth events detected by the wrong unit.
    pub const fn assignment_errors(&self) -> u64 {
        self.fpae + self.fpaoe
    }

    /// Named values in display order.
    pub fn entries(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("KS", self.gt_events),
            ("FS", self.ev_events),
            ("matched", self.matched),
            ("TP", self.tp),
            ("TPO", self.tpo),
            ("FP", self.fp),
            ("FN+FNO", self.missed()),
            ("FN", self.fn_),
            ("FNO", self.fno),
            ("FPAE+FPAOE", self.assignment_errors()),
            ("FPAE", self.fpae),
            ("FPAOE", self.fpaoe),
        ]
    }
}

/// Everything derived from one pooled matching pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contingency {
    pub gt_units: Vec<UnitId>,
    pub ev_units: Vec<UnitId>,
    pub matrix: ContingencyMatrix,
    pub records: Vec<ClassificationRecord>,
    pub summary: EvaluationSummary,
}

/// Per-unit tallies collected during the pooled sweep.
struct Tally {
    /// Matched pairs outside overlap epochs, per (gt unit, ev unit).
    plain: ContingencyMatrix,
    /// Matched pairs inside overlap epochs, per (gt unit, ev unit).
    overlapping: ContingencyMatrix,
    /// Missed ground-truth events per unit: (outside, inside) overlap.
    missed: Vec<(u64, u64)>,
    /// Ground-truth events per unit inside overlap epochs.
    known_overlapping: Vec<u64>,
    /// Unmatched estimated events per unit.
    spurious: Vec<u64>,
}

/// Matches all units at once and derives the contingency matrix,
/// classification records and summary.
pub fn build(
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    tolerance: i64,
    overlaps: &OverlapIntervals,
) -> Result<Contingency, ConfigError> {
    if tolerance < 0 {
        return Err(ConfigError::Negative {
            field: "tolerance",
            value: tolerance,
        });
    }

    let gt_units: Vec<UnitId> = ground_truth.units().cloned().collect();
    let ev_units: Vec<UnitId> = estimated.units().cloned().collect();
    let tally = tally(ground_truth, estimated, tolerance, overlaps);

    let matrix = tally.plain.added(&tally.overlapping);

    let gt_sizes: Vec<u64> = ground_truth.iter().map(|(_, t)| t.len() as u64).collect();
    let ev_sizes: Vec<u64> = estimated.iter().map(|(_, t)| t.len() as u64).collect();

    let records: Vec<ClassificationRecord> = gt_units
        .iter()
        .enumerate()
        .map(|(i, gt_unit)| {
            let best = matrix.best_col(i);
            let (fn_, fno) = tally.missed[i];
            let mut counts = ClassificationCounts {
                ks: gt_sizes[i],
                kso: tally.known_overlapping[i],
                fn_,
                fno,
                ..ClassificationCounts::default()
            };
            if let Some(b) = best {
                counts.fs = ev_sizes[b];
                counts.tp = tally.plain.get(i, b);
                counts.tpo = tally.overlapping.get(i, b);
                counts.fpae = tally.plain.row_sum(i) - counts.tp;
                counts.fpaoe = tally.overlapping.row_sum(i) - counts.tpo;
                counts.fpa = tally.plain.col_sum(b) - counts.tp;
                counts.fpao = tally.overlapping.col_sum(b) - counts.tpo;
                counts.fp = tally.spurious[b];
            }
            ClassificationRecord {
                gt_unit: gt_unit.clone(),
                ev_unit: best.map(|b| ev_units[b].clone()),
                counts,
            }
        })
        .collect();

    let summary = EvaluationSummary {
        gt_events: gt_sizes.iter().sum(),
        ev_events: ev_sizes.iter().sum(),
        matched: matrix.total(),
        tp: records.iter().map(|r| r.counts.tp).sum(),
        tpo: records.iter().map(|r| r.counts.tpo).sum(),
        fp: tally.spurious.iter().sum(),
        fn_: tally.missed.iter().map(|(plain, _)| plain).sum(),
        fno: tally.missed.iter().map(|(_, inside)| inside).sum(),
        fpae: records.iter().map(|r| r.counts.fpae).sum(),
        fpaoe: records.iter().map(|r| r.counts.fpaoe).sum(),
    };

    tracing::debug!(
        gt_units = gt_units.len(),
        ev_units = ev_units.len(),
        matched = summary.matched,
        fp = summary.fp,
        missed = summary.missed(),
        "built contingency"
    );

    Ok(Contingency {
        gt_units,
        ev_units,
        matrix,
        records,
        summary,
    })
}

fn tally(
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    tolerance: i64,
    overlaps: &OverlapIntervals,
) -> Tally {
    let gt_pooled = ground_truth.pooled();
    let ev_pooled = estimated.pooled();
    let gt_samples: Vec<i64> = gt_pooled.iter().map(|&(t, _)| t).collect();
    let ev_samples: Vec<i64> = ev_pooled.iter().map(|&(t, _)| t).collect();

    let mut tally = Tally {
        plain: ContingencyMatrix::zeros(ground_truth.len(), estimated.len()),
        overlapping: ContingencyMatrix::zeros(ground_truth.len(), estimated.len()),
        missed: vec![(0, 0); ground_truth.len()],
        known_overlapping: vec![0; ground_truth.len()],
        spurious: vec![0; estimated.len()],
    };

    for &(sample, unit) in &gt_pooled {
        if overlaps.contains(sample) {
            tally.known_overlapping[unit] += 1;
        }
    }

    for record in sweep(&gt_samples, &ev_samples, tolerance) {
        match (record, record.category(overlaps)) {
            (
                MatchRecord::Matched {
                    gt_index, ev_index, ..
                },
                category,
            ) => {
                let (row, col) = (gt_pooled[gt_index].1, ev_pooled[ev_index].1);
                if category == MatchCategory::Tpo {
                    tally.overlapping.increment(row, col);
                } else {
                    tally.plain.increment(row, col);
                }
            }
            (MatchRecord::Missed { gt_index, .. }, category) => {
                let missed = &mut tally.missed[gt_pooled[gt_index].1];
                if category == MatchCategory::Fno {
                    missed.1 += 1;
                } else {
                    missed.0 += 1;
                }
            }
            (MatchRecord::Spurious { ev_index, .. }, _) => {
                tally.spurious[ev_pooled[ev_index].1] += 1;
            }
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(units: &[(u64, &[i64])]) -> TrainSet {
        units.iter().map(|(u, t)| (*u, t.to_vec())).collect()
    }

    fn assert_identities(contingency: &Contingency) {
        for record in &contingency.records {
            let c = record.counts;
            assert_eq!(
                c.ks,
                c.tp + c.tpo + c.fpae + c.fpaoe + c.fn_ + c.fno,
                "KS identity for {}",
                record.label()
            );
            assert_eq!(
                c.fs,
                c.tp + c.tpo + c.fpa + c.fpao + c.fp,
                "FS identity for {}",
                record.label()
            );
        }
    }

    #[test]
    fn single_pair_with_hit_miss_and_spurious() {
        let gt = set(&[(0, &[100, 200])]);
        let ev = set(&[(0, &[100, 500])]);

        let c = build(&gt, &ev, 2, &OverlapIntervals::none()).unwrap();

        assert_eq!(c.records.len(), 1);
        let counts = c.records[0].counts;
        assert_eq!(counts.tp, 1);
        assert_eq!(counts.fn_, 1);
        assert_eq!(counts.fp, 1);
        assert_eq!(counts.ks, 2);
        assert_eq!(counts.fs, 2);
        assert_eq!(c.summary.fp, 1);
        assert_eq!(c.summary.missed(), 1);
        assert_identities(&c);
    }

    #[test]
    fn estimated_event_is_counted_for_one_ground_truth_unit_only() {
        // Both ground-truth units fire within tolerance of the single
        // estimated event; only one of them may claim it.
        let gt = set(&[(0, &[100]), (1, &[101])]);
        let ev = set(&[(7, &[101])]);

        let c = build(&gt, &ev, 3, &OverlapIntervals::none()).unwrap();

        assert_eq!(c.matrix.total(), 1);
        let tp_total: u64 = c.records.iter().map(|r| r.counts.tp + r.counts.tpo).sum();
        assert_eq!(tp_total, 1);
        assert_identities(&c);
    }

    #[test]
    fn passed_over_event_is_claimed_by_neighbouring_unit() {
        // gt 0 takes the exact hit at 100; the event at 99 still lies within
        // tolerance of gt 1 at 101.
        let gt = set(&[(0, &[100]), (1, &[101])]);
        let ev = set(&[(0, &[99]), (1, &[100])]);

        let c = build(&gt, &ev, 2, &OverlapIntervals::none()).unwrap();

        assert_eq!(c.summary.matched, 2);
        assert_eq!(c.summary.fp, 0);
        assert_eq!(c.summary.missed(), 0);
        assert_eq!(c.matrix.to_rows(), vec![vec![0, 1], vec![1, 0]]);
        assert_identities(&c);
    }

    #[test]
    fn matrix_total_is_bounded_by_smaller_side() {
        let gt = set(&[(0, &[10, 50, 90, 130]), (1, &[30, 70, 110])]);
        let ev = set(&[(0, &[11, 49, 91]), (1, &[31, 71, 112, 300]), (2, &[129, 131])]);

        let c = build(&gt, &ev, 2, &OverlapIntervals::none()).unwrap();

        let bound = gt.total_events().min(ev.total_events()) as u64;
        assert!(c.matrix.total() <= bound);
        assert_eq!(c.matrix.to_rows(), vec![vec![3, 0, 1], vec![0, 3, 0]]);
        assert_identities(&c);
    }

    #[test]
    fn misassigned_events_count_as_assignment_errors() {
        // Estimated unit 0 holds three spikes of gt 0 and one of gt 1.
        let gt = set(&[(0, &[100, 200, 300]), (1, &[150, 250])]);
        let ev = set(&[(0, &[100, 200, 300, 150]), (1, &[250])]);

        let c = build(&gt, &ev, 1, &OverlapIntervals::none()).unwrap();

        let first = &c.records[0];
        assert_eq!(first.ev_unit, Some(UnitId::Index(0)));
        assert_eq!(first.counts.tp, 3);
        assert_eq!(first.counts.fpa, 1);
        assert_eq!(first.counts.fpae, 0);

        // gt 1 ties between both estimated units; the lower id wins.
        let second = &c.records[1];
        assert_eq!(second.ev_unit, Some(UnitId::Index(0)));
        assert_eq!(second.counts.tp, 1);
        assert_eq!(second.counts.fpae, 1);
        assert_eq!(second.counts.fpa, 3);
        assert_eq!(c.summary.assignment_errors(), 1);
        assert_identities(&c);
    }

    #[test]
    fn overlap_epochs_split_counts() {
        let gt = set(&[(0, &[100, 200, 300, 400])]);
        let ev = set(&[(0, &[100, 201, 600])]);
        let overlaps = OverlapIntervals::new([(190, 310)]);

        let c = build(&gt, &ev, 2, &overlaps).unwrap();

        let counts = c.records[0].counts;
        assert_eq!(counts.kso, 2);
        assert_eq!(counts.tp, 1);
        assert_eq!(counts.tpo, 1);
        assert_eq!(counts.fn_, 1);
        assert_eq!(counts.fno, 1);
        assert_eq!(counts.fp, 1);
        assert_eq!(c.summary.fno, 1);
        assert_identities(&c);
    }

    #[test]
    fn empty_ground_truth_makes_everything_a_false_positive() {
        let ev = set(&[(0, &[10, 20]), (1, &[30])]);

        let c = build(&TrainSet::new(), &ev, 5, &OverlapIntervals::none()).unwrap();

        assert!(c.records.is_empty());
        assert_eq!(c.matrix.rows(), 0);
        assert_eq!(c.summary.fp, 3);
        assert_eq!(c.summary.tp, 0);
        assert_eq!(c.summary.missed(), 0);
    }

    #[test]
    fn empty_estimate_makes_everything_a_false_negative() {
        let gt = set(&[(0, &[10, 20]), (3, &[30])]);

        let c = build(&gt, &TrainSet::new(), 5, &OverlapIntervals::none()).unwrap();

        assert_eq!(c.records.len(), 2);
        for record in &c.records {
            assert_eq!(record.ev_unit, None);
            assert_eq!(record.counts.fn_ + record.counts.fno, record.counts.ks);
            assert_eq!(record.counts.tp + record.counts.tpo, 0);
            assert_eq!(
                record.counts.fp + record.counts.fpa + record.counts.fpao,
                0
            );
        }
        assert_eq!(c.summary.fn_, 3);
        assert_eq!(c.summary.fp, 0);
    }

    #[test]
    fn unmatched_ground_truth_unit_still_gets_a_record() {
        let gt = set(&[(0, &[100]), (1, &[5000, 6000])]);
        let ev = set(&[(0, &[100])]);

        let c = build(&gt, &ev, 2, &OverlapIntervals::none()).unwrap();

        let lonely = &c.records[1];
        assert_eq!(lonely.label(), "1/-");
        assert_eq!(lonely.counts.fn_, 2);
        assert_eq!(lonely.counts.fs, 0);
    }

    #[test]
    fn best_col_prefers_lowest_index_on_ties() {
        let matrix = ContingencyMatrix::from_rows(&[vec![0, 2, 2], vec![0, 0, 0]]).unwrap();
        assert_eq!(matrix.best_col(0), Some(1));
        assert_eq!(matrix.best_col(1), None);
        assert_eq!(matrix.col_sum(2), 2);
        assert!(ContingencyMatrix::from_rows(&[vec![1], vec![1, 2]]).is_none());
    }
}
