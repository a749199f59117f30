//! Command-line argument parsing.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use crate::audio::{ProcessingMode, Route, SessionConfig, SignalSource, ToneControl, WaveForm};
use crate::bridge::{DecodedAudio, EndOfInput};
use crate::error::DecodeError;
use crate::params::{audio_constants, PipelineConfig};
use crate::queue::{Transform, WaitKind};

/// Signal fed into the pipeline
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceArg {
    /// Default input device
    Mic,
    /// WAV file given with --file
    File,
    Square,
    Sine,
    Silent,
}

/// Where frames go after the queue
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteArg {
    /// Log the spectrum
    Analyze,
    /// Play frames back unchanged
    Loopback,
    /// Play frames back after a forward and inverse transform
    Filter,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Raw,
    Chunk,
    Buffer,
    Fft,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitArg {
    Sleep,
    Yield,
    Blocking,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndArg {
    Loop,
    Zero,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "fftscope")]
#[command(about = "Real-time audio FFT pipeline", long_about = None)]
pub struct Args {
    /// Signal source
    #[arg(long, value_enum, default_value_t = SourceArg::Mic)]
    pub source: SourceArg,

    /// WAV file for --source file
    #[arg(long, value_name = "PATH", required_if_eq("source", "file"))]
    pub file: Option<PathBuf>,

    /// Tone pitch: 0.0 = shortest period, 1.0 = longest
    #[arg(long, value_name = "RATIO", default_value_t = 0.1)]
    pub ratio: f32,

    /// What happens to captured frames
    #[arg(long, value_enum, default_value_t = RouteArg::Analyze)]
    pub route: RouteArg,

    /// Metric recorded alongside the spectrum
    #[arg(long, value_enum, default_value_t = ModeArg::Raw)]
    pub mode: ModeArg,

    /// Transform size (power of 2)
    #[arg(long, default_value_t = audio_constants::FFT_SIZE)]
    pub fft_size: usize,

    /// Samples per device callback
    #[arg(long, default_value_t = audio_constants::CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Queue slots (power of 2)
    #[arg(long, default_value_t = audio_constants::QUEUE_DEPTH)]
    pub depth: usize,

    /// Sample rate in Hz (defaults to the file's rate for --source file)
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// How long to run
    #[arg(long, value_name = "SECONDS", default_value_t = 10.0)]
    pub seconds: f32,

    /// Interval between status lines
    #[arg(long, value_name = "MS", default_value_t = 250)]
    pub report_ms: u64,

    /// How a blocked queue side waits
    #[arg(long, value_enum, default_value_t = WaitArg::Sleep)]
    pub wait: WaitArg,

    /// What a file source does when it runs out
    #[arg(long, value_enum, default_value_t = EndArg::Loop)]
    pub end: EndArg,
}

impl Args {
    /// Pipeline sizes and timing from the flags
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            sample_rate_hz: self.sample_rate.unwrap_or(defaults.sample_rate_hz),
            chunk_size: self.chunk_size,
            fft_size: self.fft_size,
            queue_depth: self.depth,
            wait: match self.wait {
                WaitArg::Sleep => defaults.wait,
                WaitArg::Yield => WaitKind::Yield,
                WaitArg::Blocking => WaitKind::Blocking {
                    timeout_ms: defaults.shutdown_timeout_ms / 10,
                },
            },
            ..defaults
        }
    }

    pub fn route(&self) -> Route {
        match self.route {
            RouteArg::Analyze => Route::Analyze,
            RouteArg::Loopback => Route::Playback {
                transform: Transform::None,
            },
            RouteArg::Filter => Route::Playback {
                transform: Transform::RoundTrip,
            },
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        match self.mode {
            ModeArg::Raw => ProcessingMode::Raw,
            ModeArg::Chunk => ProcessingMode::ChunkInfo,
            ModeArg::Buffer => ProcessingMode::BufferInfo,
            ModeArg::Fft => ProcessingMode::FftInfo,
        }
    }

    /// Build the session configuration, decoding the input file if one is used
    pub fn session_config(&self) -> Result<SessionConfig, DecodeError> {
        let mut pipeline = self.pipeline_config();

        let source = match self.source {
            SourceArg::Mic => SignalSource::Capture,
            SourceArg::File => {
                let path = self.file.as_ref().ok_or(DecodeError::NoInput)?;
                let audio = DecodedAudio::open_wav(path)?;
                if self.sample_rate.is_none() && audio.sample_rate_hz() > 0 {
                    pipeline.sample_rate_hz = audio.sample_rate_hz();
                }
                SignalSource::Decoded {
                    audio: Arc::new(audio),
                    end: match self.end {
                        EndArg::Loop => EndOfInput::Loop,
                        EndArg::Zero => EndOfInput::ZeroFill,
                    },
                }
            }
            SourceArg::Square => SignalSource::Tone(ToneControl::new(WaveForm::Square, self.ratio)),
            SourceArg::Sine => SignalSource::Tone(ToneControl::new(WaveForm::Sine, self.ratio)),
            SourceArg::Silent => SignalSource::Tone(ToneControl::new(WaveForm::Silent, self.ratio)),
        };

        Ok(SessionConfig {
            pipeline,
            source,
            route: self.route(),
            mode: self.mode(),
        })
    }
}
