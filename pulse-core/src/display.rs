//! # Display Mapping
//!
//! Maps frequencies onto the vertical axis of the pulse visualization. The
//! estimator itself is unbounded; this range is a rendering convention only.

use serde::{Deserialize, Serialize};

/// Frequency window shown by the pulse display, on a log scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl Default for DisplayRange {
    fn default() -> Self {
        Self {
            min_hz: 80.0,
            max_hz: 1000.0,
        }
    }
}

impl DisplayRange {
    /// Log-scale position of `freq` in the range: 0.0 at `min_hz`, 1.0 at `max_hz`.
    ///
    /// Frequencies outside the range map outside `[0, 1]`; callers that draw
    /// clamp with [`DisplayRange::clamped_position`]. Non-positive input gives `None`.
    pub fn position(&self, freq: f32) -> Option<f32> {
        if !freq.is_finite() || freq <= 0.0 {
            return None;
        }
        let (lo, hi) = (self.min_hz.ln(), self.max_hz.ln());
        let span = hi - lo;
        if !span.is_finite() || span <= 0.0 {
            return None;
        }
        Some((freq.ln() - lo) / span)
    }

    pub fn clamped_position(&self, freq: f32) -> Option<f32> {
        self.position(freq).map(|p| p.clamp(0.0, 1.0))
    }

    pub fn contains(&self, freq: f32) -> bool {
        (self.min_hz..=self.max_hz).contains(&freq)
    }
}
