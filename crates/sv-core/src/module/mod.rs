//! Evaluation modules.
//!
//! A module is one self-contained evaluation step, such as one metric. Each
//! module declares which inputs it needs and which result kinds it produces;
//! the runner validates the inputs against those declarations before
//! applying the module.

mod classification;
mod variation;
mod waveform;

use thiserror::Error;

use crate::params::EvaluationParams;
use crate::raw::{RawData, RawDataError};
use crate::result::{ModuleResult, ResultError, ResultKind};
use crate::runner::Alignment;
use crate::train::{TrainError, TrainSet};

pub use classification::ClassificationModule;
pub use variation::{VariationOfInformation, VariationOfInformationModule};
pub use waveform::WaveformAmplitudeModule;

/// Why a module produced no results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// The inputs do not satisfy the module's declared requirements.
    #[error("invalid input: {0}")]
    Input(String),

    /// The module failed while computing.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The module panicked.
    #[error("module panicked: {0}")]
    Panicked(String),

    /// The module returned results that differ from its declaration.
    #[error("declared results {declared:?}, produced {produced:?}")]
    UnexpectedResults {
        declared: Vec<ResultKind>,
        produced: Vec<ResultKind>,
    },
}

impl ModuleError {
    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

impl From<TrainError> for ModuleError {
    fn from(err: TrainError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<RawDataError> for ModuleError {
    fn from(err: RawDataError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<ResultError> for ModuleError {
    fn from(err: ResultError) -> Self {
        Self::Execution(err.to_string())
    }
}

/// How strongly a module depends on one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// The input is not looked at.
    #[default]
    Ignored,
    /// The input must be supplied; empty train sets are accepted.
    Required,
    /// The input must be supplied and contain at least one event.
    NonEmpty,
}

/// Input requirements of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirements {
    pub raw_data: Requirement,
    pub ground_truth: Requirement,
    pub estimated: Requirement,
}

/// Everything a module may look at for one recording.
#[derive(Debug, Clone, Copy)]
pub struct ModuleInput<'a> {
    pub raw_data: Option<&'a RawData>,
    pub ground_truth: &'a TrainSet,
    /// Estimated trains as supplied, before shift correction.
    pub estimated: &'a TrainSet,
    /// Shift correction, overlap epochs and contingency of the run.
    pub alignment: &'a Alignment,
}

impl<'a> ModuleInput<'a> {
    /// The shift-corrected estimated trains. A negative shift may move early
    /// events below sample 0.
    pub const fn corrected(&self) -> &'a TrainSet {
        &self.alignment.corrected
    }
}

/// A pluggable evaluation step.
pub trait EvalModule: Send + Sync {
    /// Stable name used in outcomes and on the command line.
    fn name(&self) -> &'static str;

    fn requirements(&self) -> Requirements;

    /// Result kinds produced by [`EvalModule::apply`], in order.
    fn result_kinds(&self) -> &'static [ResultKind];

    /// Checks the inputs before the module runs.
    ///
    /// The default enforces [`EvalModule::requirements`]; modules with
    /// extra preconditions should call [`check_requirements`] first.
    fn validate(
        &self,
        input: &ModuleInput<'_>,
        _params: &EvaluationParams,
    ) -> Result<(), ModuleError> {
        check_requirements(self.requirements(), input)
    }

    fn apply(
        &self,
        input: &ModuleInput<'_>,
        params: &EvaluationParams,
    ) -> Result<Vec<ModuleResult>, ModuleError>;
}

/// Enforces declared requirements against the supplied inputs.
///
/// Trains are checked as the caller supplied them; shift correction never
/// turns valid input into invalid input.
pub fn check_requirements(
    requirements: Requirements,
    input: &ModuleInput<'_>,
) -> Result<(), ModuleError> {
    if requirements.raw_data != Requirement::Ignored && input.raw_data.is_none() {
        return Err(ModuleError::Input("raw_data: needs raw data".to_string()));
    }
    check_trains(
        "ground truth",
        requirements.ground_truth,
        input.ground_truth,
    )?;
    check_trains("estimated", requirements.estimated, input.estimated)?;
    Ok(())
}

fn check_trains(
    what: &str,
    requirement: Requirement,
    trains: &TrainSet,
) -> Result<(), ModuleError> {
    match requirement {
        Requirement::Ignored => return Ok(()),
        Requirement::Required => {}
        Requirement::NonEmpty => {
            if trains.has_no_events() {
                return Err(ModuleError::Input(format!(
                    "{what}: needs a non-empty spike train set"
                )));
            }
        }
    }
    trains
        .validate()
        .map_err(|err| ModuleError::Input(format!("{what}: {err}")))
}

/// The modules shipped with the engine, in their default run order.
pub fn default_modules() -> Vec<Box<dyn EvalModule>> {
    vec![
        Box::new(ClassificationModule),
        Box::new(VariationOfInformationModule),
        Box::new(WaveformAmplitudeModule),
    ]
}

/// Looks up a shipped module by name.
pub fn module_by_name(name: &str) -> Option<Box<dyn EvalModule>> {
    default_modules().into_iter().find(|m| m.name() == name)
}
