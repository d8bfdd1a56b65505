//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sv_core::{EvaluationParams, ShiftMode};

/// Spike sorting evaluation.
///
/// Aligns estimated spike trains to ground truth, matches events and reports
/// per-unit classification counts and clustering metrics.
#[derive(Debug, Parser)]
#[command(name = "spikeval", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Evaluate one sorting against its ground truth.
    Evaluate {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        overrides: ParamOverrides,

        /// Comma-separated module names (default: all shipped modules).
        #[arg(long, value_delimiter = ',')]
        modules: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Estimate the shift between estimated and ground-truth trains.
    Shift {
        /// Ground-truth spike trains (JSON object of unit -> samples).
        #[arg(long)]
        ground_truth: PathBuf,

        /// Estimated spike trains (JSON object of unit -> samples).
        #[arg(long)]
        estimated: PathBuf,

        #[command(flatten)]
        overrides: ParamOverrides,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Evaluate every recording listed in a manifest, in parallel.
    Batch {
        /// JSON list of `{name, ground_truth, estimated, raw?}` entries.
        /// Paths are relative to the manifest.
        #[arg(long)]
        manifest: PathBuf,

        #[command(flatten)]
        overrides: ParamOverrides,

        /// Comma-separated module names (default: all shipped modules).
        #[arg(long, value_delimiter = ',')]
        modules: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Input files of one recording.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Ground-truth spike trains (JSON object of unit -> samples).
    #[arg(long)]
    pub ground_truth: PathBuf,

    /// Estimated spike trains (JSON object of unit -> samples).
    #[arg(long)]
    pub estimated: PathBuf,

    /// Raw recording (JSON array of samples, one array of channel values each).
    #[arg(long)]
    pub raw: Option<PathBuf>,
}

/// Evaluation parameters given on the command line. These win over every
/// configuration layer.
#[derive(Debug, Clone, Default, Args)]
pub struct ParamOverrides {
    /// Half-width of the shift search, in samples.
    #[arg(long, allow_negative_numbers = true)]
    pub max_shift: Option<i64>,

    /// Matching tolerance, in samples.
    #[arg(long, allow_negative_numbers = true)]
    pub tolerance: Option<i64>,

    /// Shift correction: none, global or per-unit.
    #[arg(long)]
    pub shift_mode: Option<ShiftMode>,

    /// Detect overlap epochs with this window, in samples.
    #[arg(long, allow_negative_numbers = true)]
    pub overlap_window: Option<i64>,
}

impl ParamOverrides {
    pub fn apply(&self, params: &mut EvaluationParams) {
        if let Some(max_shift) = self.max_shift {
            params.max_shift = max_shift;
        }
        if let Some(tolerance) = self.tolerance {
            params.tolerance = tolerance;
        }
        if let Some(mode) = self.shift_mode {
            params.shift_mode = mode;
        }
        if let Some(window) = self.overlap_window {
            params.overlap_window = Some(window);
        }
    }
}
