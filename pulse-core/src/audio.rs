//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! The device callback slices the incoming stream into fixed-size frames and sends
//! them over a channel; [`CaptureSource`] hands the newest one to the detection loop
//! as 8-bit biased samples.
//!
//! ## Features
//! - Automatic input device selection
//! - Preference for mono, with downmixing of multi-channel devices
//! - Frames of a fixed size for the whole session
//! - Latest-frame-wins delivery through a one-slot channel, so frames never
//!   pile up while the consumer is slow or idle

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::TunerConfig;
use crate::detection::FrameSource;
use crate::tone::float_to_byte;
use crate::AudioFrame;

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `frame_size` - Samples per frame
/// * `target_rate` - Preferred sample rate in Hz; the nearest supported rate is used
///
/// # Returns
/// * `Ok((stream, frames, sample_rate))` - Playing stream handle, a one-slot channel
///   always holding the newest complete mono frame, and the actual sample rate
/// * `Err(e)` - No device, no f32 input format, or the stream failed to start
pub fn start_audio_capture(
    frame_size: usize,
    target_rate: u32,
) -> Result<(cpal::Stream, Receiver<Vec<f32>>, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("[CAPTURE] Using audio input device: {}", device.name()?);

    let configs = device
        .supported_input_configs()
        .context("Failed to query input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate = config.sample_rate().0;
    let channels = config.channels().max(1) as usize;
    let config: cpal::StreamConfig = config.into();

    log::info!("[CAPTURE] Selected sample rate: {sample_rate} Hz, {channels} channel(s)");

    let err_fn = |err: cpal::StreamError| {
        log::error!("[CAPTURE] An error occurred on the audio stream: {err}")
    };

    let (sender, receiver) = crossbeam_channel::bounded::<Vec<f32>>(1);
    let stale = receiver.clone();

    // Accumulates mono samples until a full frame is available.
    let mut audio_buffer: Vec<f32> = Vec::with_capacity(frame_size * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels == 1 {
                audio_buffer.extend_from_slice(data);
            } else {
                audio_buffer.extend(
                    data.chunks_exact(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }

            while audio_buffer.len() >= frame_size {
                let frame_to_send = audio_buffer[..frame_size].to_vec();
                send_latest(&sender, &stale, frame_to_send);
                audio_buffer.drain(..frame_size);
            }
        },
        err_fn,
        None,
    )?;

    stream.play().context("Failed to start input stream")?;

    Ok((stream, receiver, sample_rate))
}

/// Puts `item` into a one-slot channel, evicting whatever unread item is there.
///
/// `stale` must be a receiver of the same channel. Returns `false` only when
/// the channel is disconnected or a concurrent sender refilled the slot.
pub fn send_latest<T>(sender: &Sender<T>, stale: &Receiver<T>, item: T) -> bool {
    match sender.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(item)) => {
            let _ = stale.try_recv();
            sender.try_send(item).is_ok()
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Mono is preferred over multi-channel,
/// then the range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let supported = c.min_sample_rate().0..=c.max_sample_rate().0;
            let rate_diff = if supported.contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (c.channels() != 1, rate_diff)
        })
}

/// Converts float samples to 8-bit biased samples.
pub fn to_byte_samples(samples: &[f32]) -> Vec<u8> {
    samples.iter().map(|&s| float_to_byte(s)).collect()
}

/// Microphone-backed [`FrameSource`].
///
/// Owns the CPAL stream; dropping the source stops capture.
pub struct CaptureSource {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    sample_rate: u32,
}

impl CaptureSource {
    /// Opens the default input device with the session's frame size and preferred rate.
    pub fn start(config: &TunerConfig) -> Result<Self> {
        let (stream, receiver, sample_rate) =
            start_audio_capture(config.frame_size, config.preferred_sample_rate)?;
        Ok(Self {
            stream,
            receiver,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pauses the stream and releases the device.
    pub fn stop(self) -> Result<()> {
        self.stream.pause().context("Failed to pause input stream")?;
        log::info!("[CAPTURE] Input stream stopped");
        Ok(())
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> Option<AudioFrame> {
        let latest = self.receiver.try_recv().ok()?;
        Some(AudioFrame::new(to_byte_samples(&latest), self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_conversion_is_biased() {
        assert_eq!(to_byte_samples(&[0.0, -1.0, 0.5, 1.5]), vec![128, 0, 192, 255]);
    }

    #[test]
    fn send_latest_keeps_only_newest_frame() {
        let (sender, receiver) = crossbeam_channel::bounded::<Vec<f32>>(1);
        let stale = receiver.clone();

        for i in 0..100 {
            assert!(send_latest(&sender, &stale, vec![i as f32; 4]));
            assert_eq!(receiver.len(), 1);
        }
        assert_eq!(receiver.try_recv().unwrap(), vec![99.0; 4]);
        assert!(receiver.try_recv().is_err());

        // Empty slot after a read takes the next frame without eviction.
        assert!(send_latest(&sender, &stale, vec![7.0]));
        assert_eq!(receiver.try_recv().unwrap(), vec![7.0]);
    }

    #[test]
    fn send_latest_reports_disconnect() {
        let (sender, receiver) = crossbeam_channel::bounded::<u8>(1);
        drop(receiver);
        let (_, other) = crossbeam_channel::bounded::<u8>(1);
        assert!(!send_latest(&sender, &other, 1));
    }
}
