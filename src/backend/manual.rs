//! Caller-driven backend.
//!
//! No device is involved: whoever holds the [`ManualBackend`] decides when the
//! capture callback receives samples (`feed`) and when the playback callback
//! is asked for them (`render`). Used for headless runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{AudioBackend, AudioStream, CaptureCallback, PlaybackCallback, StreamSpec};
use crate::error::BackendError;

struct Port<C> {
    callback: Mutex<Option<C>>,
    running: AtomicBool,
}

impl<C> Port<C> {
    fn new() -> Self {
        Self {
            callback: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    fn install(&self, callback: C) {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
        self.running.store(false, Ordering::Release);
    }

    fn release(&self) {
        self.running.store(false, Ordering::Release);
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[derive(Default)]
struct Faults {
    capture: bool,
    playback: bool,
}

/// Backend whose callbacks are invoked by the caller
#[derive(Clone)]
pub struct ManualBackend {
    capture: Arc<Port<CaptureCallback>>,
    playback: Arc<Port<PlaybackCallback>>,
    faults: Arc<Mutex<Faults>>,
    last_spec: Arc<Mutex<Option<StreamSpec>>>,
}

impl Default for ManualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualBackend {
    pub fn new() -> Self {
        Self {
            capture: Arc::new(Port::new()),
            playback: Arc::new(Port::new()),
            faults: Arc::new(Mutex::new(Faults::default())),
            last_spec: Arc::new(Mutex::new(None)),
        }
    }

    /// Make the next `open_capture` fail as if no input device existed
    pub fn fail_capture(&self, fail: bool) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture = fail;
    }

    /// Make the next `open_playback` fail as if no output device existed
    pub fn fail_playback(&self, fail: bool) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .playback = fail;
    }

    /// Deliver one capture chunk. Returns false if no running capture stream exists.
    pub fn feed(&self, chunk: &[f32]) -> bool {
        if !self.capture.running.load(Ordering::Acquire) {
            return false;
        }
        let mut slot = self
            .capture
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(callback) => {
                callback(chunk);
                true
            }
            None => false,
        }
    }

    /// Request one playback chunk. Returns false if no running playback stream exists.
    pub fn render(&self, out: &mut [f32]) -> bool {
        if !self.playback.running.load(Ordering::Acquire) {
            return false;
        }
        let mut slot = self
            .playback
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(callback) => {
                callback(out);
                true
            }
            None => false,
        }
    }

    pub fn capture_open(&self) -> bool {
        self.capture
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn playback_open(&self) -> bool {
        self.playback
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Format requested by the most recent `open_*` call
    pub fn last_spec(&self) -> Option<StreamSpec> {
        *self.last_spec.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, spec: &StreamSpec) {
        *self.last_spec.lock().unwrap_or_else(PoisonError::into_inner) = Some(*spec);
    }
}

enum Direction {
    Capture(Arc<Port<CaptureCallback>>),
    Playback(Arc<Port<PlaybackCallback>>),
}

/// Stream handle of a [`ManualBackend`]; dropping it releases the callback
pub struct ManualStream {
    direction: Direction,
}

impl ManualStream {
    fn running(&self) -> &AtomicBool {
        match &self.direction {
            Direction::Capture(port) => &port.running,
            Direction::Playback(port) => &port.running,
        }
    }
}

impl AudioStream for ManualStream {
    fn resume(&self) -> Result<(), BackendError> {
        self.running().store(true, Ordering::Release);
        Ok(())
    }

    fn suspend(&self) -> Result<(), BackendError> {
        self.running().store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        match &self.direction {
            Direction::Capture(port) => port.release(),
            Direction::Playback(port) => port.release(),
        }
    }
}

impl AudioBackend for ManualBackend {
    type Stream = ManualStream;

    fn open_capture(
        &mut self,
        spec: &StreamSpec,
        callback: CaptureCallback,
    ) -> Result<ManualStream, BackendError> {
        if self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture
        {
            return Err(BackendError::NoDevice("input"));
        }
        self.remember(spec);
        self.capture.install(callback);
        Ok(ManualStream {
            direction: Direction::Capture(Arc::clone(&self.capture)),
        })
    }

    fn open_playback(
        &mut self,
        spec: &StreamSpec,
        callback: PlaybackCallback,
    ) -> Result<ManualStream, BackendError> {
        if self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .playback
        {
            return Err(BackendError::NoDevice("output"));
        }
        self.remember(spec);
        self.playback.install(callback);
        Ok(ManualStream {
            direction: Direction::Playback(Arc::clone(&self.playback)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn spec() -> StreamSpec {
        StreamSpec {
            sample_rate_hz: 8000,
            chunk_size: 4,
        }
    }

    #[test]
    fn test_callbacks_only_run_while_resumed() {
        let mut backend = ManualBackend::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let stream = backend
            .open_capture(
                &spec(),
                Box::new(move |chunk: &[f32]| {
                    counter.fetch_add(chunk.len(), Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert!(backend.capture_open());
        assert_eq!(backend.last_spec(), Some(spec()));

        assert!(!backend.feed(&[0.0; 4]));
        stream.resume().unwrap();
        assert!(backend.feed(&[0.0; 4]));
        stream.suspend().unwrap();
        assert!(!backend.feed(&[0.0; 4]));
        assert_eq!(seen.load(Ordering::SeqCst), 4);

        drop(stream);
        assert!(!backend.capture_open());
    }

    #[test]
    fn test_render_fills_output() {
        let mut backend = ManualBackend::new();
        let stream = backend
            .open_playback(&spec(), Box::new(|out: &mut [f32]| out.fill(0.5)))
            .unwrap();
        stream.resume().unwrap();

        let mut out = [0.0_f32; 4];
        assert!(backend.render(&mut out));
        assert_eq!(out, [0.5; 4]);
    }

    #[test]
    fn test_fault_injection() {
        let mut backend = ManualBackend::new();
        backend.fail_playback(true);
        assert!(matches!(
            backend.open_playback(&spec(), Box::new(|_: &mut [f32]| {})),
            Err(BackendError::NoDevice("output"))
        ));
        backend.fail_playback(false);
        assert!(backend
            .open_playback(&spec(), Box::new(|_: &mut [f32]| {}))
            .is_ok());
    }
}
