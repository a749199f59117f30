//! Pull-based display surface shared between the pipeline and the UI.
//!
//! Producers (bridges, the analysis thread) write into a [`Scope`]; a display
//! reads spectrum bins, the latest frame of samples and timing statistics on
//! demand. Scalars are atomics; the two arrays sit behind mutexes that the
//! real-time side only ever `try_lock`s.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Which measurement the pipeline records alongside the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Spectrum and the most recent sample only
    #[default]
    Raw,
    /// Samples per callback and time between callbacks
    ChunkInfo,
    /// Time to fill one queue frame
    BufferInfo,
    /// Forward transform duration
    FftInfo,
}

impl ProcessingMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ChunkInfo,
            2 => Self::BufferInfo,
            3 => Self::FftInfo,
            _ => Self::Raw,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::ChunkInfo => 1,
            Self::BufferInfo => 2,
            Self::FftInfo => 3,
        }
    }
}

/// Point-in-time copy of the scalar readings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScopeStats {
    pub last_sample: f32,
    pub chunk_samples: u32,
    pub chunk_ms: f64,
    pub fill_buffer_ms: f64,
    pub fft_ms: f64,
    /// Frames pushed into the queue so far
    pub frames: u64,
    /// Spectra published so far
    pub spectra: u64,
}

/// Shared readings for one session
#[derive(Debug)]
pub struct Scope {
    mode: AtomicU8,
    last_sample: AtomicU32,
    chunk_samples: AtomicU32,
    chunk_ms: AtomicU64,
    fill_buffer_ms: AtomicU64,
    fft_ms: AtomicU64,
    frames: AtomicU64,
    spectra: AtomicU64,
    spectrum: Mutex<Vec<f32>>,
    samples: Mutex<Vec<f32>>,
}

impl Scope {
    /// Create a scope sized for `bin_count` bins and `frame_len` samples
    pub fn new(mode: ProcessingMode, bin_count: usize, frame_len: usize) -> Self {
        Self {
            mode: AtomicU8::new(mode.as_u8()),
            last_sample: AtomicU32::new(0.0_f32.to_bits()),
            chunk_samples: AtomicU32::new(0),
            chunk_ms: AtomicU64::new(0.0_f64.to_bits()),
            fill_buffer_ms: AtomicU64::new(0.0_f64.to_bits()),
            fft_ms: AtomicU64::new(0.0_f64.to_bits()),
            frames: AtomicU64::new(0),
            spectra: AtomicU64::new(0),
            spectrum: Mutex::new(vec![0.0; bin_count]),
            samples: Mutex::new(vec![0.0; frame_len]),
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        ProcessingMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: ProcessingMode) {
        self.mode.store(mode.as_u8(), Ordering::Relaxed);
    }

    pub fn stats(&self) -> ScopeStats {
        ScopeStats {
            last_sample: f32::from_bits(self.last_sample.load(Ordering::Relaxed)),
            chunk_samples: self.chunk_samples.load(Ordering::Relaxed),
            chunk_ms: f64::from_bits(self.chunk_ms.load(Ordering::Relaxed)),
            fill_buffer_ms: f64::from_bits(self.fill_buffer_ms.load(Ordering::Relaxed)),
            fft_ms: f64::from_bits(self.fft_ms.load(Ordering::Relaxed)),
            frames: self.frames.load(Ordering::Relaxed),
            spectra: self.spectra.load(Ordering::Acquire),
        }
    }

    /// Copy the current magnitude bins into `out`; returns the bin count
    pub fn read_spectrum(&self, out: &mut Vec<f32>) -> usize {
        let spectrum = self.spectrum.lock().unwrap_or_else(PoisonError::into_inner);
        out.clear();
        out.extend_from_slice(&spectrum);
        out.len()
    }

    /// Copy the most recent frame of time-domain samples into `out`
    pub fn read_samples(&self, out: &mut Vec<f32>) -> usize {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        out.clear();
        out.extend_from_slice(&samples);
        out.len()
    }

    /// Index and magnitude of the strongest bin, if any bin is non-zero
    pub fn peak_bin(&self) -> Option<(usize, f32)> {
        let spectrum = self.spectrum.lock().unwrap_or_else(PoisonError::into_inner);
        spectrum
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, m)| m > 0.0)
            .fold(None, |best: Option<(usize, f32)>, (i, m)| match best {
                Some((_, b)) if b >= m => best,
                _ => Some((i, m)),
            })
    }

    /// Called once per device callback (or software chunk)
    pub fn record_chunk(&self, chunk: &[f32], since_last: Option<Duration>) {
        if let Some(&last) = chunk.last() {
            self.last_sample.store(last.to_bits(), Ordering::Relaxed);
        }
        if self.mode() == ProcessingMode::ChunkInfo {
            self.chunk_samples
                .store(chunk.len() as u32, Ordering::Relaxed);
            if let Some(interval) = since_last {
                store_ms(&self.chunk_ms, interval);
            }
        }
    }

    /// Called when a frame is complete, before it is pushed
    pub fn record_frame(&self, frame: &[f32], fill_time: Duration) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        if self.mode() == ProcessingMode::BufferInfo {
            store_ms(&self.fill_buffer_ms, fill_time);
        }
        // Skip the history update rather than block the callback
        if let Ok(mut samples) = self.samples.try_lock() {
            if samples.len() == frame.len() {
                samples.copy_from_slice(frame);
            }
        }
    }

    pub fn record_transform(&self, elapsed: Duration) {
        if self.mode() == ProcessingMode::FftInfo {
            store_ms(&self.fft_ms, elapsed);
        }
    }

    /// Replace the displayed spectrum
    pub fn publish_spectrum(&self, bins: &[f32]) {
        {
            let mut spectrum = self.spectrum.lock().unwrap_or_else(PoisonError::into_inner);
            spectrum.clear();
            spectrum.extend_from_slice(bins);
        }
        self.spectra.fetch_add(1, Ordering::Release);
    }
}

fn store_ms(cell: &AtomicU64, elapsed: Duration) {
    cell.store(
        (elapsed.as_secs_f64() * 1000.0).to_bits(),
        Ordering::Relaxed,
    );
}
