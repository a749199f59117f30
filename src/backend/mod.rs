//! Narrow interface to the host audio system.
//!
//! A backend opens one mono `f32` stream per direction. Streams are returned
//! paused; the session resumes and suspends them, and dropping a stream
//! releases the device.

mod manual;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;

use crate::error::BackendError;

pub use manual::{ManualBackend, ManualStream};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{CpalBackend, CpalStream};

/// Called from the capture thread with each chunk of recorded samples
pub type CaptureCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Called from the playback thread with a chunk to fill
pub type PlaybackCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Requested stream format (always one channel of 32-bit float)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate_hz: u32,
    /// Samples per callback
    pub chunk_size: usize,
}

/// An open device stream
pub trait AudioStream {
    /// Let the device start invoking the callback
    fn resume(&self) -> Result<(), BackendError>;

    /// Stop invoking the callback until resumed
    fn suspend(&self) -> Result<(), BackendError>;
}

/// Opens capture and playback streams
pub trait AudioBackend {
    type Stream: AudioStream;

    fn open_capture(
        &mut self,
        spec: &StreamSpec,
        callback: CaptureCallback,
    ) -> Result<Self::Stream, BackendError>;

    fn open_playback(
        &mut self,
        spec: &StreamSpec,
        callback: PlaybackCallback,
    ) -> Result<Self::Stream, BackendError>;
}
