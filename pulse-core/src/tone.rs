//! # Reference Tone Module
//!
//! Synthesizes sine tones as 8-bit biased frames. Used for the reference
//! "tuning fork" source and for exercising the estimator offline.

use std::f64::consts::TAU;

use crate::detection::FrameSource;
use crate::{AudioFrame, SAMPLE_BIAS};

/// Converts a float sample in `[-1, 1]` to a biased byte, clamping overshoot.
pub fn float_to_byte(sample: f32) -> u8 {
    let scaled = (SAMPLE_BIAS as f32 * (1.0 + sample)).floor();
    scaled.clamp(0.0, 255.0) as u8
}

/// Renders `len` samples of a sine wave starting at `phase` (radians).
///
/// `amplitude` is a fraction of full scale.
pub fn sine_samples(
    frequency: f32,
    sample_rate: u32,
    len: usize,
    amplitude: f32,
    phase: f64,
) -> Vec<u8> {
    let step = TAU * frequency as f64 / sample_rate.max(1) as f64;
    (0..len)
        .map(|i| {
            let value = amplitude as f64 * (phase + step * i as f64).sin();
            float_to_byte(value as f32)
        })
        .collect()
}

/// A single sine frame starting at zero phase.
pub fn sine_frame(frequency: f32, sample_rate: u32, len: usize, amplitude: f32) -> AudioFrame {
    AudioFrame::new(
        sine_samples(frequency, sample_rate, len, amplitude, 0.0),
        sample_rate,
    )
}

/// A [`FrameSource`] that produces a continuous sine tone.
///
/// Phase carries over between frames, so consecutive frames join up as if
/// they had been cut from one long recording.
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency: f32,
    sample_rate: u32,
    frame_size: usize,
    amplitude: f32,
    phase: f64,
}

impl ToneSource {
    pub fn new(frequency: f32, sample_rate: u32, frame_size: usize) -> Self {
        log::info!("[TONE] Reference tone {frequency:.2} Hz at {sample_rate} Hz");
        Self {
            frequency,
            sample_rate,
            frame_size,
            amplitude: 0.9,
            phase: 0.0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Retunes the tone without resetting its phase.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }
}

impl FrameSource for ToneSource {
    fn next_frame(&mut self) -> Option<AudioFrame> {
        let samples = sine_samples(
            self.frequency,
            self.sample_rate,
            self.frame_size,
            self.amplitude,
            self.phase,
        );
        let step = TAU * self.frequency as f64 / self.sample_rate.max(1) as f64;
        self.phase = (self.phase + step * self.frame_size as f64) % TAU;
        Some(AudioFrame::new(samples, self.sample_rate))
    }
}
