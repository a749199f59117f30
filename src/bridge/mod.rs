//! Sample bridge between device callbacks and the slot queue.
//!
//! Device callbacks deliver or request chunks whose size is fixed by the
//! device; the queue moves whole frames of the transform size. The bridges
//! accumulate and split between the two.

mod decoded;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::Scope;
use crate::error::TransferError;
use crate::queue::{Consumer, Producer, Transform};

pub use decoded::{DecodedAudio, DecodedReader, EndOfInput};

/// Full-scale divisor for signed 16-bit PCM
pub const I16_SCALE: f32 = 32768.0;

/// Anything that can fill a chunk of mono samples on demand
pub trait SampleSource: Send {
    fn fill(&mut self, out: &mut [f32]);
}

/// Convert one signed 16-bit PCM sample to a normalized float
pub fn pcm_i16_to_f32(sample: i16) -> f32 {
    sample as f32 / I16_SCALE
}

/// Convert a run of signed 16-bit PCM samples; converts `min(src, dst)` samples
pub fn convert_i16(src: &[i16], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = pcm_i16_to_f32(s);
    }
}

/// Accumulates capture chunks into frames and pushes them into the queue
pub struct CaptureBridge {
    producer: Producer,
    transform: Transform,
    frame: Box<[f32]>,
    filled: usize,
    scope: Arc<Scope>,
    last_chunk: Option<Instant>,
    frame_started: Instant,
}

impl CaptureBridge {
    pub fn new(producer: Producer, transform: Transform, scope: Arc<Scope>) -> Self {
        let frame = vec![0.0; producer.frame_len()].into_boxed_slice();
        Self {
            producer,
            transform,
            frame,
            filled: 0,
            scope,
            last_chunk: None,
            frame_started: Instant::now(),
        }
    }

    /// Take one chunk from the capture callback.
    ///
    /// Pushes every frame the chunk completes. Blocks while the queue is full;
    /// returns `Disabled` once the queue has been shut down. Samples from a
    /// chunk that could not be pushed are discarded.
    pub fn write(&mut self, chunk: &[f32]) -> Result<(), TransferError> {
        let now = Instant::now();
        let since_last = self.last_chunk.map(|t| now.duration_since(t));
        self.last_chunk = Some(now);
        self.scope.record_chunk(chunk, since_last);

        let mut rest = chunk;
        while !rest.is_empty() {
            if self.filled == 0 {
                self.frame_started = Instant::now();
            }
            let take = (self.frame.len() - self.filled).min(rest.len());
            self.frame[self.filled..self.filled + take].copy_from_slice(&rest[..take]);
            self.filled += take;
            rest = &rest[take..];

            if self.filled == self.frame.len() {
                self.filled = 0;
                self.scope
                    .record_frame(&self.frame, self.frame_started.elapsed());
                self.producer.push(&self.frame, self.transform)?;
                if self.transform.forward_on_push() {
                    self.scope.record_transform(self.producer.last_transform());
                }
            }
        }
        Ok(())
    }

    /// Samples waiting for the current frame to complete
    pub fn pending(&self) -> usize {
        self.filled
    }
}

/// Splits popped frames into playback chunks
pub struct PlaybackBridge {
    consumer: Consumer,
    frame: Box<[f32]>,
    cursor: usize,
}

impl PlaybackBridge {
    pub fn new(consumer: Consumer) -> Self {
        let len = consumer.frame_len();
        Self {
            consumer,
            frame: vec![0.0; len].into_boxed_slice(),
            cursor: len,
        }
    }

    /// Fill one playback chunk, popping frames as needed.
    ///
    /// Blocks while the queue is empty. If the queue is disabled the rest of
    /// `out` is filled with silence and `Disabled` is returned.
    pub fn read(&mut self, out: &mut [f32]) -> Result<(), TransferError> {
        let mut written = 0;
        while written < out.len() {
            if self.cursor == self.frame.len() {
                if let Err(e) = self.consumer.pop(&mut self.frame) {
                    out[written..].fill(0.0);
                    return Err(e);
                }
                self.cursor = 0;
            }
            let take = (self.frame.len() - self.cursor).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.frame[self.cursor..self.cursor + take]);
            self.cursor += take;
            written += take;
        }
        Ok(())
    }

    /// Duration of the last inverse transform applied on pop
    pub fn last_transform(&self) -> Duration {
        self.consumer.last_transform()
    }
}
