//! # Musical Tuning Module
//!
//! This module maps frequencies onto the twelve-tone equal-tempered scale.
//! It handles pitch-class lookup, cent deviation, and the reference
//! "tuning fork" tones singers match against.
//!
//! ## Features
//! - Nearest pitch class for any positive frequency (A4 = 440 Hz by default)
//! - MIDI note numbers and cents from the nearest note
//! - Reference tone table from C3 to C5

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::DEFAULT_REFERENCE_PITCH;
use crate::error::TunerError;

/// MIDI note number of A4.
const A4_MIDI: i32 = 69;

/// A chromatic pitch class, or `Undefined` when there is no valid frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NoteName {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
    #[default]
    Undefined,
}

impl NoteName {
    /// Pitch classes in chromatic order starting at C.
    pub const CHROMATIC: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
    ];

    /// Display label, using the sharp sign. `Undefined` renders as "-".
    pub fn label(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C♯",
            NoteName::D => "D",
            NoteName::DSharp => "D♯",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F♯",
            NoteName::G => "G",
            NoteName::GSharp => "G♯",
            NoteName::A => "A",
            NoteName::ASharp => "A♯",
            NoteName::B => "B",
            NoteName::Undefined => "-",
        }
    }

    pub fn is_defined(self) -> bool {
        self != NoteName::Undefined
    }

    /// Pitch class of a MIDI note number; negative numbers wrap.
    pub fn from_midi(midi: i32) -> NoteName {
        Self::CHROMATIC[midi.rem_euclid(12) as usize]
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the nearest pitch class to `freq`, with A4 = 440 Hz.
///
/// Zero, negative and non-finite input yields [`NoteName::Undefined`].
pub fn note_for_frequency(freq: f32) -> NoteName {
    note_for_frequency_with(freq, DEFAULT_REFERENCE_PITCH)
}

/// Returns the nearest pitch class to `freq` for a custom A4 reference.
pub fn note_for_frequency_with(freq: f32, reference_a4: f32) -> NoteName {
    midi_number(freq, reference_a4).map_or(NoteName::Undefined, NoteName::from_midi)
}

/// Nearest MIDI note number for `freq`, or `None` for unusable input.
///
/// Half-way values round up, so a frequency exactly between two notes
/// resolves to the higher one.
pub fn midi_number(freq: f32, reference_a4: f32) -> Option<i32> {
    semitones_from_a4(freq, reference_a4).map(|n| (n + 0.5).floor() as i32 + A4_MIDI)
}

/// Deviation in cents from the nearest equal-tempered note.
///
/// The result lies in `[-50, 50)`; positive is sharp, negative is flat.
pub fn cents_from_nearest(freq: f32, reference_a4: f32) -> Option<f32> {
    semitones_from_a4(freq, reference_a4).map(|n| ((n - (n + 0.5).floor()) * 100.0) as f32)
}

fn semitones_from_a4(freq: f32, reference_a4: f32) -> Option<f64> {
    if !freq.is_finite() || freq <= 0.0 || !reference_a4.is_finite() || reference_a4 <= 0.0 {
        return None;
    }
    let n = 12.0 * (freq as f64 / reference_a4 as f64).log2();
    n.is_finite().then_some(n)
}

/// Reference tones offered for matching, keyed by scientific pitch name.
static REFERENCE_TONES: Lazy<BTreeMap<&'static str, f32>> = Lazy::new(|| {
    [
        ("C3", 130.81),
        ("D3", 146.83),
        ("E3", 164.81),
        ("F3", 174.61),
        ("G3", 196.00),
        ("A3", 220.00),
        ("B3", 246.94),
        ("C4", 261.63),
        ("D4", 293.66),
        ("E4", 329.63),
        ("F4", 349.23),
        ("G4", 392.00),
        ("A4", 440.00),
        ("B4", 493.88),
        ("C5", 523.25),
    ]
    .into_iter()
    .collect()
});

/// Frequency of a reference tone, falling back to A4 for unknown names.
pub fn reference_frequency(name: &str) -> f32 {
    REFERENCE_TONES
        .get(name)
        .copied()
        .unwrap_or(DEFAULT_REFERENCE_PITCH)
}

/// Frequency of a reference tone, or an error naming the unknown note.
pub fn lookup_reference_frequency(name: &str) -> Result<f32, TunerError> {
    REFERENCE_TONES
        .get(name)
        .copied()
        .ok_or_else(|| TunerError::UnknownReferenceNote(name.to_string()))
}

/// Names of all reference tones, lowest first.
pub fn reference_note_names() -> Vec<&'static str> {
    let mut names: Vec<_> = REFERENCE_TONES.iter().map(|(&name, &freq)| (name, freq)).collect();
    names.sort_by(|a, b| a.1.total_cmp(&b.1));
    names.into_iter().map(|(name, _)| name).collect()
}
