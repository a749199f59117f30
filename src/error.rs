//! Error types for the transform, queue, device and session layers.

use thiserror::Error;

/// Errors raised while constructing a transform
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftError {
    /// Size is not a power of two, or is below the minimum of 4
    #[error("FFT size must be a power of two >= 4, got {0}")]
    InvalidSize(usize),
}

/// Configuration rejected by `validate()`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A size that must be a power of two is not
    #[error("{name} must be a power of two >= {min}, got {value}")]
    NotPowerOfTwo {
        name: &'static str,
        min: usize,
        value: usize,
    },

    /// Sample rate of zero
    #[error("Sample rate must be > 0")]
    ZeroSampleRate,

    /// Callback chunk size out of range
    #[error("Chunk size must be in 1..=65535, got {0}")]
    ChunkSize(usize),
}

/// Reasons a queue push or pop returned without transferring a frame
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// Frame length does not match the slot width
    #[error("Frame length {actual} does not match slot size {expected}")]
    FrameLength { expected: usize, actual: usize },

    /// The queue was disabled while (or before) waiting
    #[error("Queue disabled")]
    Disabled,
}

/// Errors reported by an audio backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// No device of the requested direction
    #[error("No audio {0} device found")]
    NoDevice(&'static str),

    /// Device refused the requested format
    #[error("Unsupported stream format: {0}")]
    Format(String),

    /// Failed to build the stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    /// Failed to resume the stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlay(String),

    /// Failed to pause the stream
    #[error("Failed to pause audio stream: {0}")]
    StreamPause(String),
}

/// Errors while loading decoded audio
#[derive(Error, Debug)]
pub enum DecodeError {
    /// WAV container or sample decoding failed
    #[error("WAV decode failed: {0}")]
    Wav(#[from] hound::Error),

    /// Integer sample width the converter does not handle
    #[error("Unsupported bit depth: {0}")]
    BitDepth(u16),

    /// File source selected without a path
    #[error("No input file given")]
    NoInput,
}

/// Errors from `Session::init`
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Transform setup failed: {0}")]
    Fft(#[from] FftError),

    #[error("Audio device error: {0}")]
    Backend(#[from] BackendError),

    /// Worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
