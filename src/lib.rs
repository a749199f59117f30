//! fftscope library - real-time audio FFT pipeline

pub mod audio;
pub mod backend;
pub mod bridge;
pub mod cli;
pub mod error;
pub mod fft;
pub mod params;
pub mod queue;
