//! Software producer thread for sources without a device clock.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::activity::Busy;
use crate::bridge::{CaptureBridge, SampleSource};

/// Fraction of the remaining chunk time actually slept.
///
/// Sleeping slightly short keeps the feeder ahead of the consumer; the queue
/// blocks it once it gets too far ahead.
pub const SLEEP_FRACTION: f64 = 0.9;

/// Poll interval while the session is paused
const PAUSED_POLL: Duration = Duration::from_millis(2);

/// Paces a loop to roughly one iteration per `target`
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    target: Duration,
    started: Instant,
}

impl Cadence {
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            started: Instant::now(),
        }
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    /// How long `wait` would sleep right now
    pub fn remaining(&self) -> Duration {
        self.target
            .saturating_sub(self.started.elapsed())
            .mul_f64(SLEEP_FRACTION)
    }

    /// Sleep out the rest of the current period, then start the next one
    pub fn wait(&mut self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
        self.restart();
    }

    pub fn restart(&mut self) {
        self.started = Instant::now();
    }
}

/// Spawn a thread that pulls chunks from `source` into `bridge` while
/// `running` is set, until `stop` is set or the queue is disabled.
pub fn spawn_feeder_thread(
    mut source: Box<dyn SampleSource>,
    mut bridge: CaptureBridge,
    chunk_size: usize,
    period: Duration,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    busy: Busy,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("fftscope-feeder".into())
        .spawn(move || {
            let _busy = busy;
            let mut chunk = vec![0.0_f32; chunk_size];
            let mut cadence = Cadence::new(period);

            while !stop.load(Ordering::Acquire) {
                if !running.load(Ordering::Acquire) {
                    thread::sleep(PAUSED_POLL);
                    cadence.restart();
                    continue;
                }

                source.fill(&mut chunk);
                if bridge.write(&chunk).is_err() {
                    break;
                }
                cadence.wait();
            }
            log::debug!("Feeder thread exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_sleeps_fraction_of_remaining() {
        let cadence = Cadence::new(Duration::from_millis(100));
        let remaining = cadence.remaining();
        assert!(remaining <= Duration::from_millis(90));
        assert!(remaining > Duration::from_millis(50));
    }

    #[test]
    fn test_cadence_overrun_does_not_sleep() {
        let mut cadence = Cadence::new(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(3));
        assert_eq!(cadence.remaining(), Duration::ZERO);

        let started = Instant::now();
        cadence.wait();
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_cadence_paces_loop() {
        let mut cadence = Cadence::new(Duration::from_millis(4));
        let started = Instant::now();
        for _ in 0..5 {
            cadence.wait();
        }
        // 5 periods at 90% each
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
