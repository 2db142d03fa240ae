//! # Pitch Pulse Monitor
//!
//! Headless host for the detection loop. Captures from the default microphone
//! (or synthesizes a reference tone) and prints the live reading to the terminal.
//!
//! ## Architecture
//! - **Main Thread**: owns the frame source and the detection loop
//! - **Audio Callback**: CPAL thread slicing input into frames (see `pulse_core::audio`)
//! - **Ticks**: a crossbeam ticker drives one detection cycle per interval

mod readout;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{after, never, select, tick};
use pulse_core::audio::CaptureSource;
use pulse_core::config::TunerConfig;
use pulse_core::tone::ToneSource;
use pulse_core::tuning::{lookup_reference_frequency, reference_note_names};
use pulse_core::{DetectionLoop, DetectionState, FrameSource};
use readout::ConsoleReadout;

#[derive(Debug, Parser)]
#[command(name = "pulse-monitor", about = "Live singing pitch monitor")]
struct Args {
    /// JSON config file; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analyse a synthesized reference tone (e.g. A4, C3) instead of the microphone
    #[arg(long, value_name = "NOTE")]
    tone: Option<String>,

    /// Stop after this many seconds instead of running until interrupted
    #[arg(long)]
    seconds: Option<u64>,

    /// Print the effective config as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("Could not load config from {}", path.display()))?,
        None => TunerConfig::default(),
    };

    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let readout = ConsoleReadout::stdout(config.display, config.reference_pitch);

    match &args.tone {
        Some(name) => {
            let frequency = lookup_reference_frequency(name).with_context(|| {
                format!("Available tones: {}", reference_note_names().join(", "))
            })?;
            let source =
                ToneSource::new(frequency, config.preferred_sample_rate, config.frame_size);
            let (_, state) = run(source, readout, config, args.seconds);
            report(&state);
        }
        None => {
            let source =
                CaptureSource::start(&config).context("Failed to start microphone capture")?;
            if source.sample_rate() != config.preferred_sample_rate {
                log::warn!(
                    "[MONITOR] Device runs at {} Hz instead of the preferred {} Hz",
                    source.sample_rate(),
                    config.preferred_sample_rate
                );
            }
            let (source, state) = run(source, readout, config, args.seconds);
            source.stop()?;
            report(&state);
        }
    }

    Ok(())
}

/// Drives the detection loop on a timer until the optional deadline passes.
fn run<S: FrameSource>(
    source: S,
    readout: ConsoleReadout<std::io::Stdout>,
    config: TunerConfig,
    seconds: Option<u64>,
) -> (S, DetectionState) {
    let deadline = seconds.map(|s| after(Duration::from_secs(s))).unwrap_or_else(never);

    let mut detector = DetectionLoop::new(source, readout, config);
    let session = detector.config();
    log::info!(
        "[MONITOR] Frames of {} samples, one tick every {} ms",
        session.frame_size,
        session.tick_interval_ms
    );
    let ticker = tick(Duration::from_millis(session.tick_interval_ms));
    detector.start();

    loop {
        select! {
            recv(ticker) -> _ => {
                detector.tick();
            },
            recv(deadline) -> _ => {
                detector.stop();
                break;
            },
        }
    }

    let (source, readout, state) = detector.into_parts();
    let updates = readout.updates();
    readout.finish();
    log::info!("[MONITOR] Published {updates} readings");
    (source, state)
}

fn report(state: &DetectionState) {
    match state.last_update() {
        Some(update) => log::info!(
            "[MONITOR] Last reading: {} at {:.1} Hz",
            update.note,
            update.frequency
        ),
        None => log::info!("[MONITOR] No pitch detected"),
    }
}
