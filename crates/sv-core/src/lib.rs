//! Core engine for evaluating spike sorting results against ground truth.
//!
//! This crate contains the fundamental types and logic for:
//! - Shift estimation: correcting systematic latency of a sorter
//! - Event matching: pairing estimated and ground-truth spikes within a tolerance
//! - Contingency: per-unit classification counts and run summaries
//! - Modules: pluggable metrics run by the module runner

pub mod contingency;
pub mod matching;
pub mod module;
pub mod overlap;
pub mod params;
pub mod raw;
pub mod result;
pub mod runner;
pub mod shift;
pub mod train;

pub use contingency::{
    ClassificationCounts, ClassificationRecord, Contingency, ContingencyMatrix, EvaluationSummary,
};
pub use matching::{MatchCategory, MatchRecord, match_trains};
pub use module::{EvalModule, ModuleError, ModuleInput, default_modules, module_by_name};
pub use overlap::OverlapIntervals;
pub use params::{ConfigError, EvaluationParams, ShiftMode};
pub use raw::{RawData, RawDataError};
pub use result::{Mapping, ModuleResult, ResultKind, Table};
pub use runner::{
    Alignment, Evaluation, ModuleOutcome, Recording, RecordingOutcome, ResultSink, evaluate,
    evaluate_batch, run, run_into,
};
pub use shift::{Shift, ShiftEstimate, estimate_shift, estimate_unit_shifts};
pub use train::{EventTrain, TrainError, TrainSet, UnitId};
