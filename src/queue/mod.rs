//! Bounded single-producer / single-consumer queue of fixed-size frames.
//!
//! Bridges a real-time audio callback and a transform/consumer step. Each
//! slot holds one frame of `frame_len` samples; a slot can carry a
//! [`Transform`] tag that runs the forward FFT when the frame is pushed
//! and/or the inverse FFT when it is popped.
//!
//! # Cursors
//!
//! The read and write cursors are free-running `u32` counters masked by
//! `depth - 1` to find the slot. Both start at 1, so slot 0 counts as the
//! last slot read and the first frame produced lands in slot 1. The queue
//! is empty when the cursors are equal and full when `depth - 1` frames are
//! unread; one slot is always kept free.
//!
//! The producer publishes a slot with a release store of the write cursor
//! and the consumer observes it with an acquire load (and vice versa for the
//! read cursor). Slot storage sits behind a per-slot mutex that is never
//! contended while the cursor discipline holds, so no unsafe code is needed.
//!
//! Blocking is spin-with-backoff through a [`WaitStrategy`]. A full queue
//! blocks the producer, which pushes backpressure into the capture callback.

mod wait;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{ConfigError, FftError, TransferError};
use crate::fft::{self, RealFft};

pub use wait::{CondvarWait, SleepWait, WaitKind, WaitStrategy, YieldWait};

/// Smallest usable depth (one readable slot plus the reserved one)
pub const MIN_DEPTH: usize = 2;

const INITIAL_CURSOR: u32 = 1;

/// In-place transform attached to a frame as it passes through the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    /// Copy only
    #[default]
    None,
    /// Forward FFT on push; the consumer receives the packed spectrum
    Forward,
    /// Inverse FFT (peak-normalized) on pop
    Inverse,
    /// Forward on push, inverse on pop
    RoundTrip,
}

impl Transform {
    pub fn forward_on_push(self) -> bool {
        matches!(self, Self::Forward | Self::RoundTrip)
    }

    pub fn inverse_on_pop(self) -> bool {
        matches!(self, Self::Inverse | Self::RoundTrip)
    }
}

struct Frame {
    samples: Box<[f32]>,
    transform: Transform,
}

struct Shared {
    slots: Box<[Mutex<Frame>]>,
    mask: u32,
    frame_len: usize,
    read: AtomicU32,
    write: AtomicU32,
    stopped: AtomicBool,
    wait: Box<dyn WaitStrategy>,
}

impl Shared {
    fn depth(&self) -> u32 {
        self.mask + 1
    }

    fn slot(&self, cursor: u32) -> MutexGuard<'_, Frame> {
        self.slots[(cursor & self.mask) as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn unread(&self) -> u32 {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    fn check_len(&self, actual: usize) -> Result<(), TransferError> {
        if actual != self.frame_len {
            return Err(TransferError::FrameLength {
                expected: self.frame_len,
                actual,
            });
        }
        Ok(())
    }
}

/// A queue that has not been split into its producer and consumer halves yet.
pub struct SlotQueue {
    shared: Arc<Shared>,
}

impl SlotQueue {
    /// Create a queue of `depth` slots, each `frame_len` samples wide.
    ///
    /// `depth` must be a power of two >= 2 and `frame_len` a valid FFT size.
    pub fn new(depth: usize, frame_len: usize, wait: WaitKind) -> Result<Self, ConfigError> {
        if depth < MIN_DEPTH || !depth.is_power_of_two() || depth > u32::MAX as usize {
            return Err(ConfigError::NotPowerOfTwo {
                name: "queue depth",
                min: MIN_DEPTH,
                value: depth,
            });
        }
        if fft::validate_size(frame_len).is_err() {
            return Err(ConfigError::NotPowerOfTwo {
                name: "frame length",
                min: fft::MIN_SIZE,
                value: frame_len,
            });
        }

        let slots = (0..depth)
            .map(|_| {
                Mutex::new(Frame {
                    samples: vec![0.0; frame_len].into_boxed_slice(),
                    transform: Transform::None,
                })
            })
            .collect();

        Ok(Self {
            shared: Arc::new(Shared {
                slots,
                mask: depth as u32 - 1,
                frame_len,
                read: AtomicU32::new(INITIAL_CURSOR),
                write: AtomicU32::new(INITIAL_CURSOR),
                stopped: AtomicBool::new(false),
                wait: wait.build(),
            }),
        })
    }

    pub fn depth(&self) -> usize {
        self.shared.depth() as usize
    }

    pub fn frame_len(&self) -> usize {
        self.shared.frame_len
    }

    /// Zero all frames, rewind both cursors and clear the stop flag
    pub fn reset(&mut self) {
        for slot in self.shared.slots.iter() {
            let mut frame = slot.lock().unwrap_or_else(PoisonError::into_inner);
            frame.samples.fill(0.0);
            frame.transform = Transform::None;
        }
        self.shared.read.store(INITIAL_CURSOR, Ordering::Release);
        self.shared.write.store(INITIAL_CURSOR, Ordering::Release);
        self.shared.stopped.store(false, Ordering::Release);
    }

    /// Control handle usable from any thread
    pub fn control(&self) -> QueueControl {
        QueueControl {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Split into the two halves, each with its own transform engine
    pub fn split(self) -> Result<(Producer, Consumer), FftError> {
        let producer = Producer {
            fft: RealFft::new(self.shared.frame_len)?,
            shared: Arc::clone(&self.shared),
            last_transform: Duration::ZERO,
        };
        let consumer = Consumer {
            fft: RealFft::new(self.shared.frame_len)?,
            shared: self.shared,
            last_transform: Duration::ZERO,
        };
        Ok((producer, consumer))
    }
}

/// Cloneable handle for shutdown and occupancy checks
#[derive(Clone)]
pub struct QueueControl {
    shared: Arc<Shared>,
}

impl QueueControl {
    /// Release every blocked and future push/pop without a transfer
    pub fn disable(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.wait.notify();
    }

    pub fn is_disabled(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Frames written but not yet read
    pub fn len(&self) -> usize {
        self.shared.unread() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writing half. Exactly one thread owns it.
pub struct Producer {
    shared: Arc<Shared>,
    fft: RealFft,
    last_transform: Duration,
}

impl Producer {
    /// Copy `frame` into the next free slot, blocking while the queue is full.
    ///
    /// With a forward-running `transform` the slot is transformed in place
    /// before it becomes visible to the consumer.
    pub fn push(&mut self, frame: &[f32], transform: Transform) -> Result<(), TransferError> {
        let shared = &*self.shared;
        shared.check_len(frame.len())?;

        let write = shared.write.load(Ordering::Relaxed);
        let capacity = shared.depth() - 1;
        loop {
            if shared.stopped.load(Ordering::Acquire) {
                return Err(TransferError::Disabled);
            }
            let read = shared.read.load(Ordering::Acquire);
            if write.wrapping_sub(read) < capacity {
                break;
            }
            shared.wait.wait();
        }

        {
            let mut slot = shared.slot(write);
            slot.samples.copy_from_slice(frame);
            if transform.forward_on_push() {
                let start = Instant::now();
                self.fft.forward(&mut slot.samples);
                self.last_transform = start.elapsed();
            }
            slot.transform = transform;
        }

        shared.write.store(write.wrapping_add(1), Ordering::Release);
        shared.wait.notify();
        Ok(())
    }

    /// Duration of the most recent forward transform
    pub fn last_transform(&self) -> Duration {
        self.last_transform
    }

    pub fn frame_len(&self) -> usize {
        self.shared.frame_len
    }

    pub fn control(&self) -> QueueControl {
        QueueControl {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Reading half. Exactly one thread owns it.
pub struct Consumer {
    shared: Arc<Shared>,
    fft: RealFft,
    last_transform: Duration,
}

impl Consumer {
    /// Copy the oldest unread frame into `dst`, blocking while the queue is empty.
    ///
    /// Frames tagged for an inverse transform arrive in `dst` as peak-normalized
    /// time-domain samples; the slot itself is left as pushed.
    pub fn pop(&mut self, dst: &mut [f32]) -> Result<(), TransferError> {
        let shared = &*self.shared;
        shared.check_len(dst.len())?;

        let read = shared.read.load(Ordering::Relaxed);
        loop {
            if shared.stopped.load(Ordering::Acquire) {
                return Err(TransferError::Disabled);
            }
            if shared.write.load(Ordering::Acquire) != read {
                break;
            }
            shared.wait.wait();
        }

        let transform = {
            let slot = shared.slot(read);
            dst.copy_from_slice(&slot.samples);
            slot.transform
        };

        shared.read.store(read.wrapping_add(1), Ordering::Release);
        shared.wait.notify();

        if transform.inverse_on_pop() {
            let start = Instant::now();
            self.fft.inverse(dst);
            self.last_transform = start.elapsed();
        }
        Ok(())
    }

    /// Duration of the most recent inverse transform
    pub fn last_transform(&self) -> Duration {
        self.last_transform
    }

    pub fn frame_len(&self) -> usize {
        self.shared.frame_len
    }

    pub fn control(&self) -> QueueControl {
        QueueControl {
            shared: Arc::clone(&self.shared),
        }
    }
}
