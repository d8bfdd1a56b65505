//! Evaluation parameters and their validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid evaluation parameters. Reported before any matching work starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },

    #[error("max_shift {max_shift} must be smaller than the recording length {samples}")]
    ShiftExceedsRecording { max_shift: i64, samples: usize },

    #[error("sampling_rate must be positive, got {value}")]
    SamplingRate { value: f64 },

    #[error("overlap interval [{start}, {end}] ends before it starts")]
    InvertedInterval { start: i64, end: i64 },

    #[error("waveform cut must span at least one sample")]
    EmptyWaveformCut,

    #[error("invalid shift mode: {value}")]
    InvalidShiftMode { value: String },
}

/// Which shift correction a run applies before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftMode {
    /// Compare the trains as given.
    None,
    /// One offset for the whole estimated set.
    #[default]
    Global,
    /// One offset per estimated unit.
    PerUnit,
}

impl ShiftMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Global => "global",
            Self::PerUnit => "per_unit",
        }
    }
}

impl fmt::Display for ShiftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "global" => Ok(Self::Global),
            "per_unit" | "per-unit" => Ok(Self::PerUnit),
            _ => Err(ConfigError::InvalidShiftMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Parameters of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationParams {
    /// Half-width of the shift search, in samples. Default: 35.
    pub max_shift: i64,

    /// Half-width of the window in which two events count as the same spike.
    /// Default: 5.
    pub tolerance: i64,

    /// Half-width of the coincidence window used while scoring shift
    /// candidates. Default: 2.
    pub shift_window: i64,

    pub shift_mode: ShiftMode,

    /// Sampling rate in Hz. Only used for reporting. Default: 32000.
    pub sampling_rate: f64,

    /// Explicit overlap epochs as inclusive `[start, end]` sample ranges.
    pub overlap_intervals: Option<Vec<(i64, i64)>>,

    /// When set (and no explicit intervals are given), overlap epochs are
    /// detected from the ground truth: events of different units closer than
    /// this many samples overlap.
    pub overlap_window: Option<i64>,

    /// Samples taken before and after each event when cutting waveforms.
    pub waveform_cut: (usize, usize),
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self {
            max_shift: 35,
            tolerance: 5,
            shift_window: 2,
            shift_mode: ShiftMode::Global,
            sampling_rate: 32_000.0,
            overlap_intervals: None,
            overlap_window: None,
            waveform_cut: (32, 32),
        }
    }
}

impl EvaluationParams {
    /// Checks the parameters, optionally against the recording length.
    pub fn validate(&self, recording_samples: Option<usize>) -> Result<(), ConfigError> {
        non_negative("max_shift", self.max_shift)?;
        non_negative("tolerance", self.tolerance)?;
        non_negative("shift_window", self.shift_window)?;
        if let Some(window) = self.overlap_window {
            non_negative("overlap_window", window)?;
        }
        if self.sampling_rate.is_nan() || self.sampling_rate <= 0.0 {
            return Err(ConfigError::SamplingRate {
                value: self.sampling_rate,
            });
        }
        for &(start, end) in self.overlap_intervals.iter().flatten() {
            if start > end {
                return Err(ConfigError::InvertedInterval { start, end });
            }
        }
        if self.waveform_cut.0 + self.waveform_cut.1 == 0 {
            return Err(ConfigError::EmptyWaveformCut);
        }
        if let Some(samples) = recording_samples {
            let fits = usize::try_from(self.max_shift).is_ok_and(|shift| shift < samples);
            if !fits {
                return Err(ConfigError::ShiftExceedsRecording {
                    max_shift: self.max_shift,
                    samples,
                });
            }
        }
        Ok(())
    }

    /// Converts a sample count to milliseconds at the configured rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn samples_to_ms(&self, samples: i64) -> f64 {
        samples as f64 * 1000.0 / self.sampling_rate
    }
}

const fn non_negative(field: &'static str, value: i64) -> Result<(), ConfigError> {
    if value < 0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = EvaluationParams::default();
        assert_eq!(params.max_shift, 35);
        assert_eq!(params.shift_mode, ShiftMode::Global);
        assert!(params.validate(None).is_ok());
    }

    #[test]
    fn negative_values_are_rejected() {
        let params = EvaluationParams {
            tolerance: -1,
            ..EvaluationParams::default()
        };
        assert_eq!(
            params.validate(None),
            Err(ConfigError::Negative {
                field: "tolerance",
                value: -1
            })
        );

        let params = EvaluationParams {
            max_shift: -4,
            ..EvaluationParams::default()
        };
        assert!(matches!(
            params.validate(None),
            Err(ConfigError::Negative {
                field: "max_shift",
                ..
            })
        ));
    }

    #[test]
    fn max_shift_must_fit_recording() {
        let params = EvaluationParams::default();
        assert!(params.validate(Some(36)).is_ok());
        assert_eq!(
            params.validate(Some(35)),
            Err(ConfigError::ShiftExceedsRecording {
                max_shift: 35,
                samples: 35
            })
        );
    }

    #[test]
    fn inverted_overlap_interval_is_rejected() {
        let params = EvaluationParams {
            overlap_intervals: Some(vec![(10, 20), (30, 25)]),
            ..EvaluationParams::default()
        };
        assert_eq!(
            params.validate(None),
            Err(ConfigError::InvertedInterval { start: 30, end: 25 })
        );
    }

    #[test]
    fn shift_mode_parses_both_spellings() {
        assert_eq!("per-unit".parse::<ShiftMode>().unwrap(), ShiftMode::PerUnit);
        assert_eq!("per_unit".parse::<ShiftMode>().unwrap(), ShiftMode::PerUnit);
        assert!("sideways".parse::<ShiftMode>().is_err());
    }

    #[test]
    fn partial_params_deserialize_with_defaults() {
        let params: EvaluationParams =
            serde_json::from_str(r#"{"tolerance": 3, "shift_mode": "per_unit"}"#).unwrap();
        assert_eq!(params.tolerance, 3);
        assert_eq!(params.shift_mode, ShiftMode::PerUnit);
        assert_eq!(params.max_shift, 35);
    }

    #[test]
    fn samples_convert_to_milliseconds() {
        let params = EvaluationParams::default();
        assert!((params.samples_to_ms(32) - 1.0).abs() < f64::EPSILON);
    }
}
