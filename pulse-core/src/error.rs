//! # Error Types
//!
//! Failures that can happen while setting the tuner up. Signal-level
//! conditions (silence, short buffers, out-of-range notes) are not errors;
//! they are reported through [`crate::PitchEstimate`] and [`crate::NoteName`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by configuration loading and reference lookups.
#[derive(Debug, Error)]
pub enum TunerError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::config::TunerConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A configuration value is outside its allowed range.
    #[error("invalid config value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// The requested reference note is not in the tuning-fork table.
    #[error("unknown reference note `{0}`")]
    UnknownReferenceNote(String),
}
