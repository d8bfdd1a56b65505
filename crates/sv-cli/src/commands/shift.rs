//! Shift command: estimates the latency of a sorting without scoring it.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use sv_core::{EvaluationParams, Shift, ShiftMode, TrainSet, estimate_shift, estimate_unit_shifts};

use super::evaluate::describe_shift;

#[derive(Debug, Serialize)]
struct JsonShift<'a> {
    shift: &'a Shift,
    max_shift: i64,
    shift_window: i64,
}

pub fn run<W: Write>(
    writer: &mut W,
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    params: &EvaluationParams,
    json: bool,
) -> Result<()> {
    params
        .validate(None)
        .context("invalid evaluation parameters")?;

    // Asking for a shift with correction disabled still searches one offset.
    let mode = match params.shift_mode {
        ShiftMode::None => ShiftMode::Global,
        mode => mode,
    };
    let estimate = match mode {
        ShiftMode::PerUnit => {
            estimate_unit_shifts(ground_truth, estimated, params.max_shift, params.shift_window)
        }
        _ => estimate_shift(ground_truth, estimated, params.max_shift, params.shift_window),
    }
    .context("shift estimation failed")?;

    if json {
        let report = JsonShift {
            shift: &estimate.shift,
            max_shift: params.max_shift,
            shift_window: params.shift_window,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        let shown = EvaluationParams {
            shift_mode: mode,
            ..params.clone()
        };
        writeln!(writer, "shift: {}", describe_shift(&estimate.shift, &shown))?;
    }
    Ok(())
}
