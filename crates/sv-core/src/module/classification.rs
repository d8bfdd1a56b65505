//! Per-unit classification table and run summary.

use crate::contingency::CLASSIFICATION_COLUMNS;
use crate::params::EvaluationParams;
use crate::result::{Mapping, ModuleResult, ResultKind, Table};

use super::{EvalModule, ModuleError, ModuleInput, Requirement, Requirements};

/// Emits the classification records of the run as a table, followed by the
/// summary totals as a mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationModule;

impl EvalModule for ClassificationModule {
    fn name(&self) -> &'static str {
        "classification"
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            raw_data: Requirement::Ignored,
            ground_truth: Requirement::Required,
            estimated: Requirement::Required,
        }
    }

    fn result_kinds(&self) -> &'static [ResultKind] {
        &[ResultKind::Table, ResultKind::Mapping]
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply(
        &self,
        input: &ModuleInput<'_>,
        _params: &EvaluationParams,
    ) -> Result<Vec<ModuleResult>, ModuleError> {
        let contingency = &input.alignment.contingency;

        let rows: Vec<Vec<f64>> = contingency
            .records
            .iter()
            .map(|record| record.counts.values().iter().map(|&v| v as f64).collect())
            .collect();
        let labels = contingency
            .records
            .iter()
            .map(crate::contingency::ClassificationRecord::label)
            .collect();
        let header = CLASSIFICATION_COLUMNS.iter().map(ToString::to_string).collect();
        let table = Table::new(rows, Some(header))?.with_row_labels(labels)?;

        let summary: Mapping = contingency
            .summary
            .entries()
            .into_iter()
            .map(|(key, value)| (key, value as f64))
            .collect();

        tracing::debug!(
            records = contingency.records.len(),
            "classification table ready"
        );
        Ok(vec![ModuleResult::Table(table), ModuleResult::Mapping(summary)])
    }
}
