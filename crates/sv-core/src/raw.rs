//! Raw multichannel recordings.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RawDataError {
    #[error("raw data must have at least one channel")]
    NoChannels,

    #[error("sample {sample} has {found} channels, expected {expected}")]
    Ragged {
        sample: usize,
        found: usize,
        expected: usize,
    },
}

/// A `samples × channels` recording, stored row-major.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>")]
pub struct RawData {
    channels: usize,
    data: Vec<f64>,
}

impl RawData {
    /// Creates a recording from flat row-major samples.
    pub fn new(channels: usize, data: Vec<f64>) -> Result<Self, RawDataError> {
        if channels == 0 {
            return Err(RawDataError::NoChannels);
        }
        if data.len() % channels != 0 {
            return Err(RawDataError::Ragged {
                sample: data.len() / channels,
                found: data.len() % channels,
                expected: channels,
            });
        }
        Ok(Self { channels, data })
    }

    /// Creates a recording from one row per sample.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, RawDataError> {
        let channels = rows.first().map_or(0, Vec::len);
        if channels == 0 {
            return Err(RawDataError::NoChannels);
        }
        if let Some((sample, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != channels) {
            return Err(RawDataError::Ragged {
                sample,
                found: row.len(),
                expected: channels,
            });
        }
        Ok(Self {
            channels,
            data: rows.concat(),
        })
    }

    pub fn samples(&self) -> usize {
        self.data.len() / self.channels
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub fn get(&self, sample: usize, channel: usize) -> f64 {
        self.data[sample * self.channels + channel]
    }
}

impl TryFrom<Vec<Vec<f64>>> for RawData {
    type Error = RawDataError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}
