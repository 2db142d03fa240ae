//! # Configuration Module
//!
//! Tunable parameters for capture, estimation and display. Every field has a
//! default, so a config file only needs to name the values it changes:
//!
//! ```json
//! { "estimator": { "rms_threshold": 0.02 }, "reference_pitch": 442.0 }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::display::DisplayRange;
use crate::error::TunerError;

/// Samples per analysis frame.
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Sample rate requested from the capture device.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Concert pitch for A4 in Hz.
pub const DEFAULT_REFERENCE_PITCH: f32 = 440.0;

/// Thresholds used by the autocorrelation estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Frames with a normalized RMS below this are treated as silence.
    pub rms_threshold: f32,
    /// Fraction of full scale a sample must exceed to end edge trimming.
    pub edge_threshold: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.01,
            edge_threshold: 0.2,
        }
    }
}

/// Top-level configuration for a tuner session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub frame_size: usize,
    pub preferred_sample_rate: u32,
    pub estimator: EstimatorConfig,
    pub reference_pitch: f32,
    pub display: DisplayRange,
    /// Interval between detection ticks when the host drives the loop on a timer.
    pub tick_interval_ms: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            preferred_sample_rate: DEFAULT_SAMPLE_RATE,
            estimator: EstimatorConfig::default(),
            reference_pitch: DEFAULT_REFERENCE_PITCH,
            display: DisplayRange::default(),
            tick_interval_ms: 16,
        }
    }
}

impl TunerConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TunerError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| TunerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&data)?;
        log::info!("[CONFIG] Loaded {}", path.display());
        Ok(config)
    }

    /// Parses and validates a JSON config string.
    pub fn from_json(data: &str) -> Result<Self, TunerError> {
        let config: TunerConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, TunerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that every value is usable by the estimator and the loop.
    pub fn validate(&self) -> Result<(), TunerError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> TunerError {
            TunerError::InvalidConfig {
                field,
                reason: reason.into(),
            }
        }

        if self.frame_size < 2 {
            return Err(invalid("frame_size", "must be at least 2 samples"));
        }
        if self.preferred_sample_rate == 0 {
            return Err(invalid("preferred_sample_rate", "must be positive"));
        }
        let rms = self.estimator.rms_threshold;
        if !rms.is_finite() || rms < 0.0 {
            return Err(invalid("estimator.rms_threshold", "must be a non-negative number"));
        }
        let edge = self.estimator.edge_threshold;
        if !edge.is_finite() || !(0.0..1.0).contains(&edge) {
            return Err(invalid("estimator.edge_threshold", "must be in [0, 1)"));
        }
        if !self.reference_pitch.is_finite() || self.reference_pitch <= 0.0 {
            return Err(invalid("reference_pitch", "must be a positive frequency"));
        }
        let DisplayRange { min_hz, max_hz } = self.display;
        if !(min_hz.is_finite() && max_hz.is_finite() && min_hz > 0.0 && min_hz < max_hz) {
            return Err(invalid(
                "display",
                format!("expected 0 < min_hz < max_hz, got {min_hz}..{max_hz}"),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be positive"));
        }
        Ok(())
    }
}
