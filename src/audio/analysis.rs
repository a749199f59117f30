//! Spectrum analysis thread.

use std::io;
use std::sync::Arc;
use std::thread;

use super::activity::Busy;
use super::Scope;
use crate::error::TransferError;
use crate::fft::FftContext;
use crate::queue::Consumer;

/// Spawn the consumer thread for the analyze route.
///
/// Frames arrive already forward-transformed; each one is reduced to
/// magnitude bins and published to `scope`. Exits once the queue is disabled.
pub fn spawn_analysis_thread(
    mut consumer: Consumer,
    mut ctx: FftContext,
    scope: Arc<Scope>,
    busy: Busy,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("fftscope-analysis".into())
        .spawn(move || {
            let _busy = busy;
            loop {
                match consumer.pop(ctx.buffer_mut()) {
                    Ok(()) => {
                        ctx.extract_bins();
                        scope.publish_spectrum(ctx.bins());
                    }
                    Err(TransferError::Disabled) => break,
                    Err(e) => {
                        log::error!("Analysis thread stopped: {}", e);
                        break;
                    }
                }
            }
            log::debug!("Analysis thread exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Activity, ProcessingMode};
    use crate::queue::{SlotQueue, Transform, WaitKind};
    use std::f32::consts::PI;

    #[test]
    fn test_publishes_spectrum_until_disabled() {
        let size = 64;
        let queue = SlotQueue::new(4, size, WaitKind::Yield).unwrap();
        let control = queue.control();
        let (mut producer, consumer) = queue.split().unwrap();
        let scope = Arc::new(Scope::new(
            ProcessingMode::Raw,
            crate::fft::bin_count(size),
            size,
        ));
        let activity = Activity::new();

        let worker = spawn_analysis_thread(
            consumer,
            FftContext::new(size).unwrap(),
            Arc::clone(&scope),
            activity.enter(),
        )
        .unwrap();

        // 8 cycles per frame lands in bin index 7
        let frame: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * 8.0 * i as f32 / size as f32).sin())
            .collect();
        producer.push(&frame, Transform::Forward).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while scope.stats().spectra == 0 && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        assert_eq!(scope.stats().spectra, 1);
        assert_eq!(scope.peak_bin().map(|(i, _)| i), Some(7));

        control.disable();
        worker.join().unwrap();
        assert_eq!(activity.in_flight(), 0);
    }
}
