//! # Detection Loop Module
//!
//! Drives one estimation cycle per scheduling tick:
//! `FrameSource -> estimator -> note mapper -> DetectionState + VisualizationSink`.
//!
//! ## Architecture
//! - **Host**: owns the timer or event loop and calls [`DetectionLoop::tick`]
//! - **Control**: start/stop arrive directly or through a cloneable [`LoopControl`]
//!   backed by a crossbeam channel, so other threads can stop capture
//! - **State**: [`DetectionState`] is written only by the loop; readers get copies
//!
//! Frames without a pitch leave the published values untouched, so the display
//! holds the last good reading through breaths and consonants.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::TunerConfig;
use crate::pitch::estimate_pitch_with;
use crate::tuning::{note_for_frequency_with, NoteName};
use crate::{AudioFrame, PitchEstimate, Unpitched};

/// Supplies audio frames to the loop.
pub trait FrameSource {
    /// Returns the newest complete frame, or `None` if no new frame is ready.
    ///
    /// A source must not hand out the same frame twice.
    fn next_frame(&mut self) -> Option<AudioFrame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<AudioFrame> {
        (**self).next_frame()
    }
}

/// Receives every published reading. Fire-and-forget.
pub trait VisualizationSink {
    fn on_pitch_update(&mut self, frequency: f32, note: NoteName);
}

impl<V: VisualizationSink + ?Sized> VisualizationSink for Box<V> {
    fn on_pitch_update(&mut self, frequency: f32, note: NoteName) {
        (**self).on_pitch_update(frequency, note)
    }
}

/// A published reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchUpdate {
    pub frequency: f32,
    pub note: NoteName,
}

/// Forwards readings to another thread over a crossbeam channel.
///
/// Readings are dropped, not queued, when a bounded channel is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<PitchUpdate>,
}

impl ChannelSink {
    pub fn new(sender: Sender<PitchUpdate>) -> Self {
        Self { sender }
    }
}

impl VisualizationSink for ChannelSink {
    fn on_pitch_update(&mut self, frequency: f32, note: NoteName) {
        match self.sender.try_send(PitchUpdate { frequency, note }) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("[DETECT] Update receiver gone, dropping reading");
            }
        }
    }
}

/// Loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Capturing,
}

/// Snapshot of what the loop last published.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionState {
    capturing: bool,
    frequency: Option<f32>,
    note: NoteName,
}

impl DetectionState {
    /// A fresh capturing state with nothing published yet.
    pub fn capturing() -> Self {
        Self {
            capturing: true,
            frequency: None,
            note: NoteName::Undefined,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn phase(&self) -> LoopPhase {
        if self.capturing {
            LoopPhase::Capturing
        } else {
            LoopPhase::Idle
        }
    }

    /// Most recently published frequency in Hz.
    pub fn frequency(&self) -> Option<f32> {
        self.frequency
    }

    /// Most recently published note.
    pub fn note(&self) -> NoteName {
        self.note
    }

    /// The last published reading, if any.
    pub fn last_update(&self) -> Option<PitchUpdate> {
        self.frequency.map(|frequency| PitchUpdate {
            frequency,
            note: self.note,
        })
    }

    fn begin_capture(&mut self) {
        *self = Self::capturing();
    }

    fn end_capture(&mut self) {
        self.capturing = false;
    }

    fn publish(&mut self, update: PitchUpdate) {
        self.frequency = Some(update.frequency);
        self.note = update.note;
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Capture is not active; no work was done.
    Idle,
    /// The source had no new frame.
    NotReady,
    /// The frame length did not match the session frame size.
    Rejected { expected: usize, actual: usize },
    /// No pitch in this frame; the previous reading is held.
    Held(Unpitched),
    /// A new reading was published.
    Published(PitchUpdate),
}

/// Runs one detection cycle against an explicit state.
///
/// Does nothing unless `state` is capturing. On a valid estimate the state is
/// updated and the sink notified; otherwise both are left alone.
pub fn run_detection_tick<S, V>(
    state: &mut DetectionState,
    source: &mut S,
    sink: &mut V,
    config: &TunerConfig,
) -> TickOutcome
where
    S: FrameSource + ?Sized,
    V: VisualizationSink + ?Sized,
{
    if !state.is_capturing() {
        return TickOutcome::Idle;
    }
    match capture_reading(source, config) {
        Ok(update) => {
            publish(state, sink, update);
            TickOutcome::Published(update)
        }
        Err(outcome) => outcome,
    }
}

/// Pulls one frame and analyses it; `Err` carries the non-publishing outcome.
fn capture_reading<S>(source: &mut S, config: &TunerConfig) -> Result<PitchUpdate, TickOutcome>
where
    S: FrameSource + ?Sized,
{
    let frame = source.next_frame().ok_or(TickOutcome::NotReady)?;
    analyse_frame(&frame, config)
}

/// Estimates pitch and note for one frame.
fn analyse_frame(frame: &AudioFrame, config: &TunerConfig) -> Result<PitchUpdate, TickOutcome> {
    if frame.len() != config.frame_size {
        log::warn!(
            "[DETECT] Dropping frame of {} samples, session frame size is {}",
            frame.len(),
            config.frame_size
        );
        return Err(TickOutcome::Rejected {
            expected: config.frame_size,
            actual: frame.len(),
        });
    }

    match estimate_pitch_with(frame, &config.estimator) {
        PitchEstimate::Pitch(frequency) => Ok(PitchUpdate {
            frequency,
            note: note_for_frequency_with(frequency, config.reference_pitch),
        }),
        PitchEstimate::Unpitched(reason) => Err(TickOutcome::Held(reason)),
    }
}

fn publish<V>(state: &mut DetectionState, sink: &mut V, update: PitchUpdate)
where
    V: VisualizationSink + ?Sized,
{
    log::trace!("[DETECT] {:.1} Hz -> {}", update.frequency, update.note);
    state.publish(update);
    sink.on_pitch_update(update.frequency, update.note);
}

/// Commands accepted by a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    Start,
    Stop,
}

/// Cloneable handle for starting and stopping a [`DetectionLoop`] from elsewhere.
///
/// Commands take effect at the loop's next check: the start of a tick, or just
/// before a reading would be published.
#[derive(Debug, Clone)]
pub struct LoopControl {
    sender: Sender<LoopCommand>,
}

impl LoopControl {
    /// Returns `false` if the loop no longer exists.
    pub fn start(&self) -> bool {
        self.sender.send(LoopCommand::Start).is_ok()
    }

    /// Returns `false` if the loop no longer exists.
    pub fn stop(&self) -> bool {
        self.sender.send(LoopCommand::Stop).is_ok()
    }
}

/// The detection state machine: `Idle <-> Capturing`.
pub struct DetectionLoop<S, V> {
    source: S,
    sink: V,
    config: TunerConfig,
    state: DetectionState,
    /// Bumped on every start so a tick can tell its capture session apart.
    session: u64,
    command_tx: Sender<LoopCommand>,
    command_rx: Receiver<LoopCommand>,
}

impl<S: FrameSource, V: VisualizationSink> DetectionLoop<S, V> {
    /// Creates an idle loop.
    pub fn new(source: S, sink: V, config: TunerConfig) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        Self {
            source,
            sink,
            config,
            state: DetectionState::default(),
            session: 0,
            command_tx,
            command_rx,
        }
    }

    /// A handle that can start or stop this loop from any thread.
    pub fn control(&self) -> LoopControl {
        LoopControl {
            sender: self.command_tx.clone(),
        }
    }

    /// `Idle -> Capturing`, resetting the published reading.
    ///
    /// Calling this while already capturing starts a fresh session.
    pub fn start(&mut self) {
        self.session = self.session.wrapping_add(1);
        self.state.begin_capture();
        log::info!("[DETECT] Capture started (session {})", self.session);
    }

    /// `Capturing -> Idle`. The last reading stays readable.
    pub fn stop(&mut self) {
        if self.state.is_capturing() {
            self.state.end_capture();
            log::info!("[DETECT] Capture stopped (session {})", self.session);
        }
    }

    /// Runs one detection cycle.
    pub fn tick(&mut self) -> TickOutcome {
        self.apply_commands();
        if !self.state.is_capturing() {
            return TickOutcome::Idle;
        }
        let session = self.session;

        let update = match capture_reading(&mut self.source, &self.config) {
            Ok(update) => update,
            Err(outcome) => return outcome,
        };

        // A stop that landed while we were estimating wins over the result.
        self.apply_commands();
        if !self.state.is_capturing() || self.session != session {
            log::debug!("[DETECT] Discarding reading from a stopped session");
            return TickOutcome::Idle;
        }

        publish(&mut self.state, &mut self.sink, update);
        TickOutcome::Published(update)
    }

    /// Copy of the current state for readers.
    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn phase(&self) -> LoopPhase {
        self.state.phase()
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sink(&self) -> &V {
        &self.sink
    }

    pub fn into_parts(self) -> (S, V, DetectionState) {
        (self.source, self.sink, self.state)
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                LoopCommand::Start => self.start(),
                LoopCommand::Stop => self.stop(),
            }
        }
    }
}
