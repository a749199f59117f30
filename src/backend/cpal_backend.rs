//! CPAL audio backend implementation
//!
//! Opens the host's default input/output devices as mono 32-bit float streams
//! with a fixed callback size.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};

use super::{AudioBackend, AudioStream, CaptureCallback, PlaybackCallback, StreamSpec};
use crate::error::BackendError;

/// Backend on the platform's default CPAL host
pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        let host = cpal::default_host();
        log::debug!("Audio host: {:?}", host.id());
        Self { host }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a CPAL stream alive. Drop this to release the device.
pub struct CpalStream {
    stream: Stream,
}

impl AudioStream for CpalStream {
    fn resume(&self) -> Result<(), BackendError> {
        self.stream
            .play()
            .map_err(|e| BackendError::StreamPlay(e.to_string()))
    }

    fn suspend(&self) -> Result<(), BackendError> {
        self.stream
            .pause()
            .map_err(|e| BackendError::StreamPause(e.to_string()))
    }
}

fn stream_config(spec: &StreamSpec) -> Result<StreamConfig, BackendError> {
    let frames = u32::try_from(spec.chunk_size)
        .map_err(|_| BackendError::Format(format!("chunk size {}", spec.chunk_size)))?;
    Ok(StreamConfig {
        channels: 1,
        sample_rate: SampleRate(spec.sample_rate_hz),
        buffer_size: BufferSize::Fixed(frames),
    })
}

/// Some hosts start streams on build; pausing is best effort
fn pause_new_stream(stream: Stream, direction: &str) -> CpalStream {
    if let Err(e) = stream.pause() {
        log::debug!("Could not pause new {} stream: {}", direction, e);
    }
    CpalStream { stream }
}

impl AudioBackend for CpalBackend {
    type Stream = CpalStream;

    fn open_capture(
        &mut self,
        spec: &StreamSpec,
        mut callback: CaptureCallback,
    ) -> Result<CpalStream, BackendError> {
        let device = self
            .host
            .default_input_device()
            .ok_or(BackendError::NoDevice("input"))?;
        let config = stream_config(spec)?;

        log::info!(
            "Capture device: {} ({}Hz, {} samples per callback)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            spec.sample_rate_hz,
            spec.chunk_size
        );

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| callback(data),
                |err| log::error!("Capture stream error: {}", err),
                None,
            )
            .map_err(|e| BackendError::StreamBuild(e.to_string()))?;

        Ok(pause_new_stream(stream, "capture"))
    }

    fn open_playback(
        &mut self,
        spec: &StreamSpec,
        mut callback: PlaybackCallback,
    ) -> Result<CpalStream, BackendError> {
        let device = self
            .host
            .default_output_device()
            .ok_or(BackendError::NoDevice("output"))?;
        let config = stream_config(spec)?;

        log::info!(
            "Playback device: {} ({}Hz, {} samples per callback)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            spec.sample_rate_hz,
            spec.chunk_size
        );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
                |err| log::error!("Playback stream error: {}", err),
                None,
            )
            .map_err(|e| BackendError::StreamBuild(e.to_string()))?;

        Ok(pause_new_stream(stream, "playback"))
    }
}
