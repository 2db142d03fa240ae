//! # Console Readout
//!
//! A [`VisualizationSink`] that redraws a single terminal line per reading:
//! note, frequency, cents from the nearest note, and the pulse bar.

use std::io::{self, Write};

use pulse_core::display::DisplayRange;
use pulse_core::tuning::cents_from_nearest;
use pulse_core::{NoteName, VisualizationSink};

/// Width of the pulse bar in characters.
const BAR_WIDTH: usize = 40;

pub struct ConsoleReadout<W: Write> {
    out: W,
    range: DisplayRange,
    reference_pitch: f32,
    updates: u64,
}

impl ConsoleReadout<io::Stdout> {
    pub fn stdout(range: DisplayRange, reference_pitch: f32) -> Self {
        Self::new(io::stdout(), range, reference_pitch)
    }
}

impl<W: Write> ConsoleReadout<W> {
    pub fn new(out: W, range: DisplayRange, reference_pitch: f32) -> Self {
        Self {
            out,
            range,
            reference_pitch,
            updates: 0,
        }
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Ends the readout line.
    pub fn finish(mut self) -> W {
        if self.updates > 0 {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
        }
        self.out
    }

    fn render(&mut self, frequency: f32, note: NoteName) -> io::Result<()> {
        let cents = cents_from_nearest(frequency, self.reference_pitch).unwrap_or(0.0);
        let bar = pulse_bar(&self.range, frequency);
        write!(
            self.out,
            "\r{:<2} {:>7.1} Hz {:>+6.1} ct |{}|",
            note.label(),
            frequency,
            cents,
            bar
        )?;
        self.out.flush()
    }
}

impl<W: Write> VisualizationSink for ConsoleReadout<W> {
    fn on_pitch_update(&mut self, frequency: f32, note: NoteName) {
        self.updates += 1;
        if let Err(e) = self.render(frequency, note) {
            log::debug!("[MONITOR] Failed to draw readout: {e}");
        }
    }
}

/// Draws the pulse as a marker on a horizontal bar, low pitches on the left.
fn pulse_bar(range: &DisplayRange, frequency: f32) -> String {
    let mut bar = vec!['-'; BAR_WIDTH];
    if let Some(position) = range.clamped_position(frequency) {
        let index = ((position * (BAR_WIDTH - 1) as f32).round() as usize).min(BAR_WIDTH - 1);
        bar[index] = 'o';
    }
    bar.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_marks_range_ends() {
        let range = DisplayRange::default();
        assert!(pulse_bar(&range, 80.0).starts_with('o'));
        assert!(pulse_bar(&range, 1000.0).ends_with('o'));
        assert!(pulse_bar(&range, 5000.0).ends_with('o'));
        assert_eq!(pulse_bar(&range, 440.0).chars().count(), BAR_WIDTH);
    }

    #[test]
    fn readout_line_contains_note_and_frequency() {
        let mut readout = ConsoleReadout::new(Vec::new(), DisplayRange::default(), 440.0);
        readout.on_pitch_update(441.0, NoteName::A);
        assert_eq!(readout.updates(), 1);
        let text = String::from_utf8(readout.finish()).unwrap();
        assert!(text.starts_with("\rA "));
        assert!(text.contains("441.0 Hz"));
        assert!(text.ends_with("|\n"));
    }
}
