// pulse-core/src/lib.rs

//! The core logic for the Pitch Pulse singing tuner.
//! This crate is responsible for pitch estimation, note mapping,
//! and the per-frame detection loop. It is completely headless
//! and contains no rendering code.

pub mod audio;
pub mod config;
pub mod detection;
pub mod display;
pub mod error;
pub mod pitch;
pub mod tone;
pub mod tuning;

pub use detection::{
    run_detection_tick, ChannelSink, DetectionLoop, DetectionState, FrameSource, LoopControl,
    LoopPhase, PitchUpdate, TickOutcome, VisualizationSink,
};
pub use error::TunerError;
pub use pitch::{estimate_pitch, estimate_pitch_with};
pub use tuning::{note_for_frequency, NoteName};

/// Sample value representing silence in an 8-bit biased frame.
pub const SAMPLE_BIAS: u8 = 128;

/// One frame of 8-bit audio as delivered by a [`FrameSource`].
///
/// Samples are unsigned and centered on [`SAMPLE_BIAS`]: 0 is full negative
/// swing, 255 full positive swing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<u8>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<u8>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A frame of `len` samples at the bias value.
    pub fn silent(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![SAMPLE_BIAS; len], sample_rate)
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Why an estimate carries no frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unpitched {
    /// RMS below the noise gate.
    InsufficientSignal,
    /// Too few samples left after trimming to search for a period.
    DegenerateBuffer,
    /// The correlation peak sat at zero lag or produced no usable frequency.
    NoPeriod,
}

/// The result of analysing a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PitchEstimate {
    /// Fundamental frequency in Hz, always finite and positive.
    Pitch(f32),
    /// No reliable pitch in this frame.
    Unpitched(Unpitched),
}

impl PitchEstimate {
    /// The estimated frequency, or `None` for the sentinel.
    pub fn frequency(&self) -> Option<f32> {
        match *self {
            PitchEstimate::Pitch(freq) => Some(freq),
            PitchEstimate::Unpitched(_) => None,
        }
    }

    pub fn is_pitched(&self) -> bool {
        matches!(self, PitchEstimate::Pitch(_))
    }
}
