//! Batch command: evaluates every recording of a manifest in parallel.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sv_core::{EvalModule, EvaluationParams, Recording, RecordingOutcome, evaluate_batch};

use super::evaluate::{JsonReport, format_evaluation};
use super::input::{self, LoadedInputs, read_json};

/// One manifest entry. Paths are relative to the manifest's directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub ground_truth: PathBuf,
    pub estimated: PathBuf,
    #[serde(default)]
    pub raw: Option<PathBuf>,
}

/// Reads a manifest and every recording it lists.
pub fn load_manifest(manifest: &Path) -> Result<Vec<Recording>> {
    let entries: Vec<ManifestEntry> = read_json(manifest)?;
    let base = manifest.parent().unwrap_or_else(|| Path::new("."));

    entries
        .into_iter()
        .map(|entry| {
            let LoadedInputs {
                ground_truth,
                estimated,
                raw_data,
            } = input::load(
                &base.join(&entry.ground_truth),
                &base.join(&entry.estimated),
                entry.raw.as_ref().map(|raw| base.join(raw)).as_deref(),
            )
            .with_context(|| format!("failed to load recording '{}'", entry.name))?;
            Ok(Recording {
                name: entry.name,
                raw_data,
                ground_truth,
                estimated,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct JsonRecording<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<JsonReport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run<W: Write>(
    writer: &mut W,
    recordings: &[Recording],
    modules: &[Box<dyn EvalModule>],
    params: &EvaluationParams,
    json: bool,
    evaluated_at: DateTime<Utc>,
) -> Result<()> {
    let outcomes = evaluate_batch(recordings, modules, params);
    let failed = outcomes.iter().filter(|o| o.evaluation.is_err()).count();
    tracing::info!(recordings = outcomes.len(), failed, "batch finished");

    if json {
        let entries: Vec<JsonRecording<'_>> = outcomes
            .iter()
            .zip(recordings)
            .map(|(outcome, recording)| json_entry(outcome, recording, params, evaluated_at))
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    for (index, (outcome, recording)) in outcomes.iter().zip(recordings).enumerate() {
        if index > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "=== {} ===", outcome.name)?;
        match &outcome.evaluation {
            Ok(evaluation) => {
                let text = format_evaluation(
                    &recording.ground_truth,
                    &recording.estimated,
                    evaluation,
                    params,
                );
                write!(writer, "{text}")?;
            }
            Err(err) => writeln!(writer, "ERROR: {err}")?,
        }
    }
    Ok(())
}

fn json_entry<'a>(
    outcome: &'a RecordingOutcome,
    recording: &Recording,
    params: &'a EvaluationParams,
    evaluated_at: DateTime<Utc>,
) -> JsonRecording<'a> {
    match &outcome.evaluation {
        Ok(evaluation) => JsonRecording {
            name: &outcome.name,
            report: Some(JsonReport::new(
                &recording.ground_truth,
                &recording.estimated,
                evaluation,
                params,
                evaluated_at,
            )),
            error: None,
        },
        Err(err) => JsonRecording {
            name: &outcome.name,
            report: None,
            error: Some(err.to_string()),
        },
    }
}
