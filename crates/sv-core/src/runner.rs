//! Runs evaluation modules against one recording, or many in parallel.
//!
//! A run first aligns the estimated trains to the ground truth (shift
//! correction, overlap epochs, pooled matching) and then hands the same
//! alignment to every module in order. Configuration errors abort the run
//! before any work; module failures are recorded and never stop later
//! modules.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use serde::Serialize;
use serde::ser::SerializeStruct;

use crate::contingency::{self, Contingency};
use crate::module::{EvalModule, ModuleError, ModuleInput};
use crate::overlap::OverlapIntervals;
use crate::params::{ConfigError, EvaluationParams, ShiftMode};
use crate::raw::RawData;
use crate::result::{ModuleResult, ResultKind};
use crate::shift::{self, Shift, ShiftEstimate};
use crate::train::TrainSet;

/// Everything the modules share for one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alignment {
    pub shift: Shift,
    /// Estimated trains after shift correction.
    pub corrected: TrainSet,
    pub overlaps: OverlapIntervals,
    pub contingency: Contingency,
}

impl Alignment {
    /// Estimates the shift, resolves overlap epochs and builds the
    /// contingency of the corrected trains.
    pub fn compute(
        ground_truth: &TrainSet,
        estimated: &TrainSet,
        params: &EvaluationParams,
    ) -> Result<Self, ConfigError> {
        let ShiftEstimate { shift, corrected } = match params.shift_mode {
            ShiftMode::None => ShiftEstimate {
                shift: Shift::Global(0),
                corrected: estimated.clone(),
            },
            ShiftMode::Global => shift::estimate_shift(
                ground_truth,
                estimated,
                params.max_shift,
                params.shift_window,
            )?,
            ShiftMode::PerUnit => shift::estimate_unit_shifts(
                ground_truth,
                estimated,
                params.max_shift,
                params.shift_window,
            )?,
        };

        let overlaps = match (&params.overlap_intervals, params.overlap_window) {
            (Some(ranges), _) => OverlapIntervals::new(ranges.iter().copied()),
            (None, Some(window)) => OverlapIntervals::detect(ground_truth, window),
            (None, None) => OverlapIntervals::none(),
        };

        let contingency = contingency::build(ground_truth, &corrected, params.tolerance, &overlaps)?;

        Ok(Self {
            shift,
            corrected,
            overlaps,
            contingency,
        })
    }
}

/// What one module produced: all of its declared results, or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutcome {
    pub module: &'static str,
    pub result: Result<Vec<ModuleResult>, ModuleError>,
}

impl ModuleOutcome {
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The results, or an empty slice for a failed module.
    pub fn results(&self) -> &[ModuleResult] {
        self.result.as_deref().unwrap_or_default()
    }

    pub fn error(&self) -> Option<&ModuleError> {
        self.result.as_ref().err()
    }
}

impl Serialize for ModuleOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ModuleOutcome", 3)?;
        state.serialize_field("module", self.module)?;
        match &self.result {
            Ok(results) => {
                state.serialize_field("status", "ok")?;
                state.serialize_field("results", results)?;
            }
            Err(err) => {
                state.serialize_field("status", "failed")?;
                state.serialize_field("error", &err.to_string())?;
            }
        }
        state.end()
    }
}

/// Receives module outcomes as they are produced.
pub trait ResultSink {
    fn accept(&mut self, outcome: ModuleOutcome);
}

impl ResultSink for Vec<ModuleOutcome> {
    fn accept(&mut self, outcome: ModuleOutcome) {
        self.push(outcome);
    }
}

/// Alignment and module outcomes of one recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub alignment: Alignment,
    pub outcomes: Vec<ModuleOutcome>,
}

/// Runs `modules` in order and returns one outcome per module.
pub fn run(
    raw_data: Option<&RawData>,
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    modules: &[Box<dyn EvalModule>],
    params: &EvaluationParams,
) -> Result<Vec<ModuleOutcome>, ConfigError> {
    evaluate(raw_data, ground_truth, estimated, modules, params).map(|e| e.outcomes)
}

/// Like [`run`], but keeps the alignment alongside the outcomes.
pub fn evaluate(
    raw_data: Option<&RawData>,
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    modules: &[Box<dyn EvalModule>],
    params: &EvaluationParams,
) -> Result<Evaluation, ConfigError> {
    let mut outcomes = Vec::with_capacity(modules.len());
    let alignment = run_into(
        raw_data,
        ground_truth,
        estimated,
        modules,
        params,
        &mut outcomes,
    )?;
    Ok(Evaluation {
        alignment,
        outcomes,
    })
}

/// Runs `modules` in order, forwarding each outcome to `sink` as soon as the
/// module finishes. Returns the alignment the modules ran against.
pub fn run_into<S: ResultSink + ?Sized>(
    raw_data: Option<&RawData>,
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    modules: &[Box<dyn EvalModule>],
    params: &EvaluationParams,
    sink: &mut S,
) -> Result<Alignment, ConfigError> {
    params.validate(raw_data.map(RawData::samples))?;
    let alignment = Alignment::compute(ground_truth, estimated, params)?;
    tracing::debug!(shift = ?alignment.shift, overlaps = alignment.overlaps.len(), "aligned");

    let input = ModuleInput {
        raw_data,
        ground_truth,
        estimated,
        alignment: &alignment,
    };
    for module in modules {
        let result = execute(module.as_ref(), &input, params);
        match &result {
            Ok(results) => {
                tracing::info!(module = module.name(), results = results.len(), "module finished");
            }
            Err(err) => tracing::warn!(module = module.name(), error = %err, "module failed"),
        }
        sink.accept(ModuleOutcome {
            module: module.name(),
            result,
        });
    }
    Ok(alignment)
}

fn execute(
    module: &dyn EvalModule,
    input: &ModuleInput<'_>,
    params: &EvaluationParams,
) -> Result<Vec<ModuleResult>, ModuleError> {
    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        module.validate(input, params)?;
        module.apply(input, params)
    }));
    let results = caught.map_err(|payload| ModuleError::Panicked(panic_message(payload.as_ref())))??;

    let produced: Vec<ResultKind> = results.iter().map(ModuleResult::kind).collect();
    if produced != module.result_kinds() {
        return Err(ModuleError::UnexpectedResults {
            declared: module.result_kinds().to_vec(),
            produced,
        });
    }
    Ok(results)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// One recording of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub name: String,
    pub raw_data: Option<RawData>,
    pub ground_truth: TrainSet,
    pub estimated: TrainSet,
}

/// Evaluation of one batch recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutcome {
    pub name: String,
    pub evaluation: Result<Evaluation, ConfigError>,
}

/// Evaluates every recording on the rayon pool. The output follows the
/// input order.
pub fn evaluate_batch(
    recordings: &[Recording],
    modules: &[Box<dyn EvalModule>],
    params: &EvaluationParams,
) -> Vec<RecordingOutcome> {
    recordings
        .par_iter()
        .map(|recording| {
            let _span = tracing::info_span!("recording", name = %recording.name).entered();
            RecordingOutcome {
                name: recording.name.clone(),
                evaluation: evaluate(
                    recording.raw_data.as_ref(),
                    &recording.ground_truth,
                    &recording.estimated,
                    modules,
                    params,
                ),
            }
        })
        .collect()
}
