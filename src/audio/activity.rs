//! In-flight tracking for callbacks and worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often `wait_idle` re-checks the counter
pub const IDLE_POLL: Duration = Duration::from_millis(1);

/// Counts code currently running against session resources
#[derive(Debug, Clone, Default)]
pub struct Activity {
    in_flight: Arc<AtomicUsize>,
}

/// Held while a callback or worker is active; dropping it leaves
#[derive(Debug)]
pub struct Busy {
    in_flight: Arc<AtomicUsize>,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> Busy {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        Busy {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Poll until nothing is in flight. Returns false if `timeout` ran out first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_flight() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(IDLE_POLL);
        }
    }
}

impl Drop for Busy {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_count() {
        let activity = Activity::new();
        let a = activity.enter();
        let b = activity.clone().enter();
        assert_eq!(activity.in_flight(), 2);
        drop(a);
        assert_eq!(activity.in_flight(), 1);
        drop(b);
        assert!(activity.wait_idle(Duration::ZERO));
    }

    #[test]
    fn test_wait_idle_times_out() {
        let activity = Activity::new();
        let _busy = activity.enter();
        let started = Instant::now();
        assert!(!activity.wait_idle(Duration::from_millis(5)));
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_wait_idle_sees_worker_finish() {
        let activity = Activity::new();
        let busy = activity.enter();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            drop(busy);
        });
        assert!(activity.wait_idle(Duration::from_secs(5)));
        worker.join().unwrap();
    }
}
