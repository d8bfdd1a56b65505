//! Evaluate command: scores one sorting against its ground truth.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sv_core::{
    Contingency, EvalModule, Evaluation, EvaluationParams, ModuleOutcome, OverlapIntervals, Shift,
    ShiftMode, TrainSet,
};

use super::input::LoadedInputs;

pub fn run<W: Write>(
    writer: &mut W,
    inputs: &LoadedInputs,
    modules: &[Box<dyn EvalModule>],
    params: &EvaluationParams,
    json: bool,
    evaluated_at: DateTime<Utc>,
) -> Result<()> {
    let evaluation = sv_core::evaluate(
        inputs.raw_data.as_ref(),
        &inputs.ground_truth,
        &inputs.estimated,
        modules,
        params,
    )
    .context("invalid evaluation parameters")?;

    if json {
        let report = JsonReport::new(
            &inputs.ground_truth,
            &inputs.estimated,
            &evaluation,
            params,
            evaluated_at,
        );
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        let text = format_evaluation(
            &inputs.ground_truth,
            &inputs.estimated,
            &evaluation,
            params,
        );
        write!(writer, "{text}")?;
    }
    Ok(())
}

/// Describes the applied shift, e.g. `-3 samples (-0.094 ms)`.
pub fn describe_shift(shift: &Shift, params: &EvaluationParams) -> String {
    match (params.shift_mode, shift) {
        (ShiftMode::None, _) => "none".to_string(),
        (_, Shift::Global(offset)) => {
            format!(
                "{offset} samples ({:.3} ms)",
                params.samples_to_ms(*offset)
            )
        }
        (_, Shift::PerUnit(offsets)) => {
            let parts: Vec<String> = offsets
                .iter()
                .map(|(unit, offset)| format!("{unit}: {offset}"))
                .collect();
            format!("per unit [{}]", parts.join(", "))
        }
    }
}

/// Formats the human-readable evaluation report.
pub fn format_evaluation(
    ground_truth: &TrainSet,
    estimated: &TrainSet,
    evaluation: &Evaluation,
    params: &EvaluationParams,
) -> String {
    let mut output = String::new();
    let alignment = &evaluation.alignment;

    writeln!(output, "ground truth: {}", describe_set(ground_truth)).unwrap();
    writeln!(output, "estimated:    {}", describe_set(estimated)).unwrap();
    writeln!(output, "shift:        {}", describe_shift(&alignment.shift, params)).unwrap();
    writeln!(output, "overlaps:     {} epochs", alignment.overlaps.len()).unwrap();

    for outcome in &evaluation.outcomes {
        writeln!(output).unwrap();
        writeln!(output, "[{}]", outcome.module).unwrap();
        match &outcome.result {
            Ok(results) => {
                for result in results {
                    write!(output, "{result}").unwrap();
                }
            }
            Err(err) => writeln!(output, "FAILED: {err}").unwrap(),
        }
    }

    output
}

fn describe_set(set: &TrainSet) -> String {
    format!("units={} events={}", set.len(), set.total_events())
}

// ========== JSON Output ==========

#[derive(Debug, Serialize)]
pub struct JsonSetSummary {
    pub units: usize,
    pub events: usize,
}

impl From<&TrainSet> for JsonSetSummary {
    fn from(set: &TrainSet) -> Self {
        Self {
            units: set.len(),
            events: set.total_events(),
        }
    }
}

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub evaluated_at: String,
    pub params: &'a EvaluationParams,
    pub ground_truth: JsonSetSummary,
    pub estimated: JsonSetSummary,
    pub shift: &'a Shift,
    pub overlaps: &'a OverlapIntervals,
    pub contingency: &'a Contingency,
    pub outcomes: &'a [ModuleOutcome],
}

impl<'a> JsonReport<'a> {
    pub fn new(
        ground_truth: &TrainSet,
        estimated: &TrainSet,
        evaluation: &'a Evaluation,
        params: &'a EvaluationParams,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            evaluated_at: evaluated_at.to_rfc3339(),
            params,
            ground_truth: ground_truth.into(),
            estimated: estimated.into(),
            shift: &evaluation.alignment.shift,
            overlaps: &evaluation.alignment.overlaps,
            contingency: &evaluation.alignment.contingency,
            outcomes: &evaluation.outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use insta::assert_snapshot;
    use sv_core::module::{VariationOfInformationModule, WaveformAmplitudeModule};

    fn inputs(gt: &[(u64, &[i64])], ev: &[(u64, &[i64])]) -> LoadedInputs {
        LoadedInputs {
            ground_truth: gt.iter().map(|(u, t)| (*u, t.to_vec())).collect(),
            estimated: ev.iter().map(|(u, t)| (*u, t.to_vec())).collect(),
            raw_data: None,
        }
    }

    fn evaluated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn text_report_shows_results_and_failures() {
        let inputs = inputs(&[(0, &[100, 200])], &[(3, &[100, 200])]);
        let modules: Vec<Box<dyn EvalModule>> = vec![
            Box::new(VariationOfInformationModule),
            Box::new(WaveformAmplitudeModule),
        ];
        let mut output = Vec::new();

        run(
            &mut output,
            &inputs,
            &modules,
            &EvaluationParams::default(),
            false,
            evaluated_at(),
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        ground truth: units=1 events=2
        estimated:    units=1 events=2
        shift:        0 samples (0.000 ms)
        overlaps:     0 epochs

        [variation_of_information]
        0
        +-----+-------+
        | Key | Value |
        +=====+=======+
        | VI  | 0     |
        | MI  | 0     |
        | Hx  | 0     |
        | Hy  | 0     |
        +-----+-------+

        [waveform_amplitude]
        FAILED: invalid input: raw_data: needs raw data
        ");
    }

    #[test]
    fn text_report_includes_classification_table() {
        let inputs = inputs(&[(0, &[100, 200, 300])], &[(0, &[103, 203, 303])]);
        let params = EvaluationParams {
            max_shift: 10,
            ..EvaluationParams::default()
        };
        let mut output = Vec::new();

        run(
            &mut output,
            &inputs,
            &sv_core::default_modules(),
            &params,
            false,
            evaluated_at(),
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("shift:        -3 samples (-0.094 ms)"));
        assert!(output.contains("[classification]"));
        assert!(output.contains("| 0/0 | 3  | 0   | 3  | 3  |"));
    }

    #[test]
    fn json_report_carries_timestamp_and_outcomes() {
        let inputs = inputs(&[(0, &[100, 200])], &[(0, &[100, 500])]);
        let params = EvaluationParams {
            shift_mode: ShiftMode::None,
            tolerance: 2,
            ..EvaluationParams::default()
        };
        let mut output = Vec::new();

        run(
            &mut output,
            &inputs,
            &sv_core::default_modules(),
            &params,
            true,
            evaluated_at(),
        )
        .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["evaluated_at"], "2025-01-01T12:00:00+00:00");
        assert_eq!(json["contingency"]["summary"]["tp"], 1);
        assert_eq!(json["contingency"]["summary"]["fp"], 1);
        assert_eq!(json["outcomes"][0]["module"], "classification");
        assert_eq!(json["outcomes"][0]["status"], "ok");
        assert_eq!(json["outcomes"][2]["status"], "failed");
    }

    #[test]
    fn invalid_parameters_fail_the_command() {
        let inputs = inputs(&[(0, &[100])], &[(0, &[100])]);
        let params = EvaluationParams {
            tolerance: -1,
            ..EvaluationParams::default()
        };
        let mut output = Vec::new();

        let err = run(
            &mut output,
            &inputs,
            &sv_core::default_modules(),
            &params,
            false,
            evaluated_at(),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "invalid evaluation parameters");
        assert!(format!("{err:#}").contains("tolerance must not be negative"));
        assert!(output.is_empty());
    }
}
