//! Loading recordings from JSON files.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use sv_core::{EvalModule, RawData, TrainSet, default_modules, module_by_name};

use crate::cli::InputArgs;

/// Reads and parses one JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// The trains and optional raw data of one recording.
#[derive(Debug)]
pub struct LoadedInputs {
    pub ground_truth: TrainSet,
    pub estimated: TrainSet,
    pub raw_data: Option<RawData>,
}

impl LoadedInputs {
    pub fn load(inputs: &InputArgs) -> Result<Self> {
        load(&inputs.ground_truth, &inputs.estimated, inputs.raw.as_deref())
    }
}

pub fn load(ground_truth: &Path, estimated: &Path, raw: Option<&Path>) -> Result<LoadedInputs> {
    let ground_truth: TrainSet = read_json(ground_truth)?;
    let estimated: TrainSet = read_json(estimated)?;
    let raw_data = raw.map(read_json::<RawData>).transpose()?;
    tracing::debug!(
        gt_units = ground_truth.len(),
        ev_units = estimated.len(),
        raw_samples = raw_data.as_ref().map(RawData::samples),
        "loaded inputs"
    );
    Ok(LoadedInputs {
        ground_truth,
        estimated,
        raw_data,
    })
}

/// Resolves module names; an empty list selects every shipped module.
pub fn select_modules(names: &[String]) -> Result<Vec<Box<dyn EvalModule>>> {
    if names.is_empty() {
        return Ok(default_modules());
    }
    names
        .iter()
        .map(|name| {
            module_by_name(name).with_context(|| {
                let known: Vec<_> = default_modules().iter().map(|m| m.name()).collect();
                format!("unknown module '{name}' (known: {})", known.join(", "))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_name_the_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("gt.json");
        std::fs::write(&path, "{\"0\": [1, 2,").unwrap();

        let err = read_json::<TrainSet>(&path).unwrap_err();

        assert!(err.to_string().starts_with("failed to parse"));
        assert!(err.to_string().contains("gt.json"));
    }

    #[test]
    fn unknown_module_lists_known_names() {
        let err = select_modules(&["nope".to_string()]).err().unwrap();
        assert!(err.to_string().contains("unknown module 'nope'"));
        assert!(err.to_string().contains("classification"));

        assert_eq!(select_modules(&[]).unwrap().len(), 3);
    }
}
