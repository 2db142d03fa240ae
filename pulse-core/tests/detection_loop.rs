use std::collections::VecDeque;

use pulse_core::config::TunerConfig;
use pulse_core::tone::sine_frame;
use pulse_core::{
    run_detection_tick, AudioFrame, ChannelSink, DetectionLoop, DetectionState, FrameSource,
    LoopControl, LoopPhase, NoteName, TickOutcome, Unpitched, VisualizationSink,
};

const SAMPLE_RATE: u32 = 44100;
const SIZE: usize = 2048;

/// Hands out a fixed script of frames, then reports "not ready".
#[derive(Default)]
struct ScriptedSource {
    frames: VecDeque<AudioFrame>,
    pulled: usize,
}

impl ScriptedSource {
    fn new(frames: impl IntoIterator<Item = AudioFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            pulled: 0,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Option<AudioFrame> {
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.pulled += 1;
        }
        frame
    }
}

#[derive(Default)]
struct RecordingSink {
    updates: Vec<(f32, NoteName)>,
}

impl VisualizationSink for RecordingSink {
    fn on_pitch_update(&mut self, frequency: f32, note: NoteName) {
        self.updates.push((frequency, note));
    }
}

fn tone(freq: f32) -> AudioFrame {
    sine_frame(freq, SAMPLE_RATE, SIZE, 0.9)
}

fn silence() -> AudioFrame {
    AudioFrame::silent(SIZE, SAMPLE_RATE)
}

fn near(value: Option<f32>, expected: f32) -> bool {
    value.is_some_and(|v| (v - expected).abs() <= expected * 0.02)
}

#[test]
fn holds_last_value_through_unpitched_frames() {
    let source = ScriptedSource::new([tone(440.0), silence(), tone(261.63)]);
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), TunerConfig::default());
    detector.start();

    assert!(matches!(detector.tick(), TickOutcome::Published(_)));
    let after_first = detector.state();
    assert!(near(after_first.frequency(), 440.0));
    assert_eq!(after_first.note(), NoteName::A);

    assert_eq!(
        detector.tick(),
        TickOutcome::Held(Unpitched::InsufficientSignal)
    );
    assert_eq!(detector.state(), after_first);

    assert!(matches!(detector.tick(), TickOutcome::Published(_)));
    assert!(near(detector.state().frequency(), 261.63));
    assert_eq!(detector.state().note(), NoteName::C);

    let notes: Vec<NoteName> = detector.sink().updates.iter().map(|u| u.1).collect();
    assert_eq!(notes, vec![NoteName::A, NoteName::C]);
}

#[test]
fn idle_loop_does_no_work() {
    let source = ScriptedSource::new([tone(440.0)]);
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), TunerConfig::default());

    assert_eq!(detector.phase(), LoopPhase::Idle);
    assert_eq!(detector.tick(), TickOutcome::Idle);
    assert_eq!(detector.source_mut().pulled, 0);
    assert!(detector.sink().updates.is_empty());
}

#[test]
fn stop_suppresses_further_updates() {
    let source = ScriptedSource::new([tone(440.0), tone(330.0), tone(523.25), tone(196.0)]);
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), TunerConfig::default());
    detector.start();
    detector.tick();
    detector.stop();

    assert_eq!(detector.phase(), LoopPhase::Idle);
    assert_eq!(detector.tick(), TickOutcome::Idle);
    assert_eq!(detector.tick(), TickOutcome::Idle);
    assert_eq!(detector.sink().updates.len(), 1);
    // The frames stay with the source; nothing was pulled after stop.
    assert_eq!(detector.source_mut().pulled, 1);

    let state = detector.state();
    assert!(!state.is_capturing());
    assert!(near(state.frequency(), 440.0));
}

#[test]
fn restart_resets_published_reading() {
    let source = ScriptedSource::new([tone(440.0), silence()]);
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), TunerConfig::default());
    detector.start();
    detector.tick();
    detector.stop();

    detector.start();
    let state = detector.state();
    assert!(state.is_capturing());
    assert_eq!(state.frequency(), None);
    assert_eq!(state.note(), NoteName::Undefined);

    // Silence after a restart leaves the fresh state alone.
    assert!(matches!(detector.tick(), TickOutcome::Held(_)));
    assert_eq!(detector.state().last_update(), None);
}

#[test]
fn missing_frame_is_not_ready() {
    let mut detector = DetectionLoop::new(
        ScriptedSource::default(),
        RecordingSink::default(),
        TunerConfig::default(),
    );
    detector.start();
    assert_eq!(detector.tick(), TickOutcome::NotReady);
    assert!(detector.state().frequency().is_none());
}

#[test]
fn wrong_frame_size_is_rejected_without_stopping() {
    let short = sine_frame(440.0, SAMPLE_RATE, 1024, 0.9);
    let source = ScriptedSource::new([short, tone(440.0)]);
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), TunerConfig::default());
    detector.start();

    assert_eq!(
        detector.tick(),
        TickOutcome::Rejected {
            expected: SIZE,
            actual: 1024
        }
    );
    assert!(matches!(detector.tick(), TickOutcome::Published(_)));
    assert_eq!(detector.sink().updates.len(), 1);
}

/// Issues a stop through the control handle while a frame is being handed out,
/// as another thread would during estimation.
struct StopDuringPull {
    inner: ScriptedSource,
    control: Option<LoopControl>,
}

impl FrameSource for StopDuringPull {
    fn next_frame(&mut self) -> Option<AudioFrame> {
        if let Some(control) = &self.control {
            assert!(control.stop());
        }
        self.inner.next_frame()
    }
}

#[test]
fn stop_during_estimation_discards_result() {
    let source = StopDuringPull {
        inner: ScriptedSource::new([tone(440.0), tone(440.0)]),
        control: None,
    };
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), TunerConfig::default());
    let control = detector.control();
    detector.source_mut().control = Some(control);
    detector.start();

    assert_eq!(detector.tick(), TickOutcome::Idle);
    assert!(detector.sink().updates.is_empty());
    assert_eq!(detector.state().frequency(), None);
    assert_eq!(detector.phase(), LoopPhase::Idle);
}

#[test]
fn control_handle_starts_and_stops() {
    let source = ScriptedSource::new([tone(440.0), tone(440.0)]);
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), TunerConfig::default());
    let control = detector.control();

    assert!(control.start());
    assert!(matches!(detector.tick(), TickOutcome::Published(_)));

    let remote = control.clone();
    std::thread::spawn(move || remote.stop()).join().unwrap();
    assert_eq!(detector.tick(), TickOutcome::Idle);
    assert_eq!(detector.sink().updates.len(), 1);

    let (_, _, state) = detector.into_parts();
    assert!(!state.is_capturing());
    assert!(!control.start(), "loop is gone");
}

#[test]
fn free_function_tick_drives_explicit_state() {
    let config = TunerConfig::default();
    let mut source = ScriptedSource::new([tone(440.0), silence()]);
    let mut sink = RecordingSink::default();

    let mut state = DetectionState::default();
    assert_eq!(
        run_detection_tick(&mut state, &mut source, &mut sink, &config),
        TickOutcome::Idle
    );

    let mut state = DetectionState::capturing();
    assert!(matches!(
        run_detection_tick(&mut state, &mut source, &mut sink, &config),
        TickOutcome::Published(_)
    ));
    assert!(matches!(
        run_detection_tick(&mut state, &mut source, &mut sink, &config),
        TickOutcome::Held(_)
    ));
    assert_eq!(state.note(), NoteName::A);
    assert_eq!(sink.updates.len(), 1);
}

#[test]
fn channel_sink_forwards_updates() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let source = ScriptedSource::new([tone(440.0)]);
    let mut detector = DetectionLoop::new(source, ChannelSink::new(tx), TunerConfig::default());
    detector.start();
    detector.tick();

    let update = rx.try_recv().unwrap();
    assert_eq!(update.note, NoteName::A);
    assert!(near(Some(update.frequency), 440.0));
    assert!(rx.try_recv().is_err());
}

#[test]
fn custom_reference_pitch_flows_to_notes() {
    let config = TunerConfig {
        reference_pitch: 466.16,
        ..TunerConfig::default()
    };
    let source = ScriptedSource::new([tone(440.0)]);
    let mut detector = DetectionLoop::new(source, RecordingSink::default(), config);
    detector.start();
    detector.tick();
    assert_eq!(detector.state().note(), NoteName::GSharp);
}

#[test]
fn loop_and_free_function_agree_on_every_outcome() {
    let script = || {
        [
            tone(440.0),
            silence(),
            sine_frame(440.0, SAMPLE_RATE, 1024, 0.9),
            tone(330.0),
        ]
    };

    let mut detector = DetectionLoop::new(
        ScriptedSource::new(script()),
        RecordingSink::default(),
        TunerConfig::default(),
    );
    detector.start();

    let config = detector.config().clone();
    let mut source = ScriptedSource::new(script());
    let mut sink = RecordingSink::default();
    let mut state = DetectionState::capturing();

    for _ in 0..5 {
        let looped = detector.tick();
        let direct = run_detection_tick(&mut state, &mut source, &mut sink, &config);
        assert_eq!(looped, direct);
    }
    assert_eq!(detector.state(), state);
    assert_eq!(detector.sink().updates, sink.updates);
    assert_eq!(
        run_detection_tick(&mut state, &mut source, &mut sink, &config),
        TickOutcome::NotReady
    );
}
