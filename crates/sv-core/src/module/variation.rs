//! Variation of information between the ground-truth and estimated
//! labelings of the matched events.
//!
//! With `n` the contingency total, `Px[i] = row_sum[i] / n`,
//! `Py[j] = col_sum[j] / n` and `Pxy[i][j] = m[i][j] / n`:
//!
//! ```text
//! H(p) = -sum p ln p
//! MI   = sum Pxy ln(Pxy / (Px Py))
//! VI   = Hx + Hy - 2 MI
//! ```
//!
//! Zero-probability terms contribute nothing.

use serde::Serialize;

use crate::contingency::ContingencyMatrix;
use crate::params::EvaluationParams;
use crate::result::{Mapping, ModuleResult, ResultKind};

use super::{EvalModule, ModuleError, ModuleInput, Requirement, Requirements};

/// Information-theoretic scores of a contingency matrix, in nats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VariationOfInformation {
    pub vi: f64,
    pub mi: f64,
    pub hx: f64,
    pub hy: f64,
}

impl VariationOfInformation {
    /// Computes the scores. An all-zero matrix scores zero everywhere.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_matrix(matrix: &ContingencyMatrix) -> Self {
        let total = matrix.total();
        if total == 0 {
            return Self::default();
        }
        let n = total as f64;

        let px: Vec<f64> = (0..matrix.rows())
            .map(|i| matrix.row_sum(i) as f64 / n)
            .collect();
        let py: Vec<f64> = (0..matrix.cols())
            .map(|j| matrix.col_sum(j) as f64 / n)
            .collect();

        let mut mi = 0.0;
        for (i, &pi) in px.iter().enumerate() {
            for (j, &pj) in py.iter().enumerate() {
                let pxy = matrix.get(i, j) as f64 / n;
                if pxy > 0.0 {
                    mi += pxy * (pxy / (pi * pj)).ln();
                }
            }
        }

        let hx = entropy(&px);
        let hy = entropy(&py);
        Self {
            // Rounding can push identical partitions a hair below zero.
            vi: (hx + hy - 2.0 * mi).max(0.0),
            mi,
            hx,
            hy,
        }
    }

    pub fn to_mapping(&self) -> Mapping {
        [
            ("VI", self.vi),
            ("MI", self.mi),
            ("Hx", self.hx),
            ("Hy", self.hy),
        ]
        .into_iter()
        .collect()
    }
}

fn entropy(p: &[f64]) -> f64 {
    -p.iter().filter(|&&v| v > 0.0).map(|&v| v * v.ln()).sum::<f64>()
}

/// Scores the run's contingency matrix. Emits VI as a scalar, then the full
/// `{VI, MI, Hx, Hy}` mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariationOfInformationModule;

impl EvalModule for VariationOfInformationModule {
    fn name(&self) -> &'static str {
        "variation_of_information"
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            raw_data: Requirement::Ignored,
            ground_truth: Requirement::NonEmpty,
            estimated: Requirement::NonEmpty,
        }
    }

    fn result_kinds(&self) -> &'static [ResultKind] {
        &[ResultKind::Scalar, ResultKind::Mapping]
    }

    fn apply(
        &self,
        input: &ModuleInput<'_>,
        _params: &EvaluationParams,
    ) -> Result<Vec<ModuleResult>, ModuleError> {
        let scores = VariationOfInformation::from_matrix(&input.alignment.contingency.matrix);
        tracing::debug!(vi = scores.vi, mi = scores.mi, "variation of information");
        Ok(vec![
            ModuleResult::Scalar(scores.vi),
            ModuleResult::Mapping(scores.to_mapping()),
        ])
    }
}
