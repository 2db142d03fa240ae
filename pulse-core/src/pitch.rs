//! # Pitch Estimation Module
//!
//! This module implements the time-domain autocorrelation estimator used by
//! the tuner. It works directly on 8-bit biased frames as delivered by the
//! capture layer.
//!
//! ## Pipeline
//! - RMS noise gate to reject silence and low-level noise
//! - Edge trimming to drop quiet lead-in and lead-out
//! - Direct autocorrelation over the trimmed window
//! - Skip of the zero-lag lobe, then a global peak search
//!
//! The bias is deliberately left in the samples while correlating; this
//! matches the reference behaviour the thresholds were tuned against.
//!
//! The bias also adds a term that decays linearly with lag. For quiet tones
//! it can swamp the periodic part so the correlation falls all the way to
//! the last lag. There is no period to read in that case, and the estimator
//! reports [`Unpitched::NoPeriod`] rather than `sample_rate / (M - 1)`.

use crate::config::EstimatorConfig;
use crate::{AudioFrame, PitchEstimate, Unpitched, SAMPLE_BIAS};

/// Estimates the fundamental frequency of a frame with the default thresholds.
pub fn estimate_pitch(frame: &AudioFrame) -> PitchEstimate {
    estimate_pitch_with(frame, &EstimatorConfig::default())
}

/// Estimates the fundamental frequency of a frame.
///
/// # Returns
/// * `PitchEstimate::Pitch(freq)` - A finite, positive frequency in Hz
/// * `PitchEstimate::Unpitched(reason)` - Silence, a degenerate window, or no period
///
/// Never panics, whatever the frame contents or length.
pub fn estimate_pitch_with(frame: &AudioFrame, config: &EstimatorConfig) -> PitchEstimate {
    let samples = frame.samples();
    let sample_rate = frame.sample_rate();

    if samples.len() < 2 || sample_rate == 0 {
        return PitchEstimate::Unpitched(Unpitched::DegenerateBuffer);
    }

    // --- Noise Gate: normalized RMS over the whole frame ---
    if rms(samples) < config.rms_threshold {
        return PitchEstimate::Unpitched(Unpitched::InsufficientSignal);
    }

    // --- Edge trimming: borrow the active part of the frame ---
    let (start, end) = trim_range(samples, config.edge_threshold);
    if end <= start || end - start < 2 {
        return PitchEstimate::Unpitched(Unpitched::DegenerateBuffer);
    }
    let window = &samples[start..end];

    // --- Autocorrelation and period search ---
    let correlation = autocorrelation(window);
    let period = match find_period(&correlation) {
        Some(lag) if lag > 0 => lag,
        _ => return PitchEstimate::Unpitched(Unpitched::NoPeriod),
    };

    let frequency = sample_rate as f32 / period as f32;
    if frequency.is_finite() && frequency > 0.0 {
        PitchEstimate::Pitch(frequency)
    } else {
        PitchEstimate::Unpitched(Unpitched::NoPeriod)
    }
}

/// Root-mean-square of the frame after mapping each sample to `s / 128 - 1`.
///
/// Returns 0.0 for an empty slice.
pub fn rms(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples
        .iter()
        .map(|&s| {
            let x = s as f32 / SAMPLE_BIAS as f32 - 1.0;
            x * x
        })
        .sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Finds the `[start, end)` range left after trimming quiet edges.
///
/// `start` is the first index in the first half whose deviation from the bias
/// exceeds `threshold * 128`, or 0. `end` is the last such index scanning back
/// from the tail through the second half, or `len - 1`. The end index itself is
/// excluded from the range.
pub fn trim_range(samples: &[u8], threshold: f32) -> (usize, usize) {
    let len = samples.len();
    if len == 0 {
        return (0, 0);
    }

    let limit = threshold * SAMPLE_BIAS as f32;
    let loud = |i: usize| (samples[i] as f32 - SAMPLE_BIAS as f32).abs() > limit;
    let half = len.div_ceil(2);

    let start = (0..half).find(|&i| loud(i)).unwrap_or(0);
    let end = (1..half).map(|i| len - i).find(|&i| loud(i)).unwrap_or(len - 1);
    (start, end)
}

/// Direct autocorrelation of `window` for every lag in `0..window.len()`.
///
/// Uses exact integer accumulation; with 8-bit samples and frames of a few
/// thousand samples the sums stay far below `u64::MAX`.
pub fn autocorrelation(window: &[u8]) -> Vec<u64> {
    let len = window.len();
    (0..len)
        .map(|lag| {
            window[..len - lag]
                .iter()
                .zip(&window[lag..])
                .map(|(&a, &b)| a as u64 * b as u64)
                .sum()
        })
        .collect()
}

/// Picks the lag of the dominant period from an autocorrelation sequence.
///
/// Skips the initial strictly decreasing run that starts at lag 0, then
/// returns the first lag holding the maximum of the remainder.
/// `None` for an empty sequence, or when the decreasing run reaches the last
/// lag and leaves nothing to search.
pub fn find_period(correlation: &[u64]) -> Option<usize> {
    let last = correlation.len().checked_sub(1)?;

    let mut dip = 0;
    while dip < last && correlation[dip] > correlation[dip + 1] {
        dip += 1;
    }
    if dip == last && last > 0 {
        return None;
    }

    let mut best = dip;
    for lag in dip + 1..correlation.len() {
        if correlation[lag] > correlation[best] {
            best = lag;
        }
    }
    Some(best)
}
