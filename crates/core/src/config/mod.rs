use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, RewindError};

/// Top-level configuration for a [`Recorder`](crate::Recorder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Longest span of history kept while recording, in seconds. `None`
    /// keeps everything.
    pub max_recording_duration: Option<f64>,
    /// Interpolate between neighbouring records during playback.
    pub smooth: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_recording_duration: None,
            smooth: false,
        }
    }
}

impl RecorderConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(window) = self.max_recording_duration {
            if window.is_nan() || window <= 0.0 {
                return Err(RewindError::InvalidConfig(format!(
                    "max_recording_duration must be positive, got {window}"
                )));
            }
        }
        Ok(())
    }

    /// Window length with `None` mapped to an unbounded duration.
    pub fn window(&self) -> f64 {
        self.max_recording_duration.unwrap_or(f64::INFINITY)
    }
}
