//! Mean waveform amplitude of every estimated unit.

use crate::params::EvaluationParams;
use crate::raw::RawData;
use crate::result::{ModuleResult, ResultKind, Table};
use crate::train::EventTrain;

use super::{
    EvalModule, ModuleError, ModuleInput, Requirement, Requirements, check_requirements,
};

/// Cuts a window around every estimated event and reports the mean
/// peak-to-peak amplitude per channel, one row per estimated unit.
///
/// Events whose window would leave the recording are skipped. A unit without
/// a single complete window reports `NaN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveformAmplitudeModule;

impl EvalModule for WaveformAmplitudeModule {
    fn name(&self) -> &'static str {
        "waveform_amplitude"
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            raw_data: Requirement::Required,
            ground_truth: Requirement::Ignored,
            estimated: Requirement::Required,
        }
    }

    fn result_kinds(&self) -> &'static [ResultKind] {
        &[ResultKind::Table]
    }

    fn validate(
        &self,
        input: &ModuleInput<'_>,
        params: &EvaluationParams,
    ) -> Result<(), ModuleError> {
        check_requirements(self.requirements(), input)?;
        let (before, after) = params.waveform_cut;
        if let Some(raw) = input.raw_data {
            if raw.samples() < before + after {
                return Err(ModuleError::Input(format!(
                    "raw_data: {} samples, fewer than one waveform of {}",
                    raw.samples(),
                    before + after
                )));
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        input: &ModuleInput<'_>,
        params: &EvaluationParams,
    ) -> Result<Vec<ModuleResult>, ModuleError> {
        let raw = input
            .raw_data
            .ok_or_else(|| ModuleError::Input("raw_data: needs raw data".to_string()))?;

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (unit, train) in input.corrected() {
            let (amplitudes, windows) = mean_peak_to_peak(raw, train, params.waveform_cut);
            tracing::debug!(%unit, windows, skipped = train.len() - windows, "cut waveforms");
            rows.push(amplitudes);
            labels.push(unit.to_string());
        }

        let header = (0..raw.channels()).map(|c| format!("ch{c}")).collect();
        let table = Table::new(rows, Some(header))?.with_row_labels(labels)?;
        Ok(vec![ModuleResult::Table(table)])
    }
}

/// Returns the per-channel mean peak-to-peak amplitude and the number of
/// windows it was averaged over.
#[allow(clippy::cast_precision_loss)]
fn mean_peak_to_peak(raw: &RawData, train: &EventTrain, cut: (usize, usize)) -> (Vec<f64>, usize) {
    let (before, after) = cut;
    let mut sums = vec![0.0; raw.channels()];
    let mut windows = 0;

    for &event in train.as_slice() {
        let Some(range) = window(event, before, after, raw.samples()) else {
            continue;
        };
        for (channel, sum) in sums.iter_mut().enumerate() {
            let (lo, hi) = range
                .clone()
                .map(|s| raw.get(s, channel))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            *sum += hi - lo;
        }
        windows += 1;
    }

    let means = if windows == 0 {
        vec![f64::NAN; raw.channels()]
    } else {
        sums.into_iter().map(|s| s / windows as f64).collect()
    };
    (means, windows)
}

/// Sample range `[event - before, event + after)`, if it lies inside the
/// recording.
fn window(
    event: i64,
    before: usize,
    after: usize,
    samples: usize,
) -> Option<std::ops::Range<usize>> {
    let event = usize::try_from(event).ok()?;
    let start = event.checked_sub(before)?;
    let end = event.checked_add(after)?;
    (end <= samples && start < end).then_some(start..end)
}
