//! Wait strategies used by blocked queue pushes and pops.

use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// How a blocked queue side passes time until the other side moves a cursor.
///
/// `wait` is called in a loop that re-checks the cursors and the stop flag,
/// so spurious returns are fine. `notify` is called after every cursor
/// advance and after `disable`.
pub trait WaitStrategy: Send + Sync {
    fn wait(&self);

    fn notify(&self) {}
}

/// Selects a [`WaitStrategy`] from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Busy-wait with a short sleep (microseconds)
    Sleep { micros: u64 },

    /// Busy-wait yielding the time slice; no real-time sleeps
    Yield,

    /// Condition variable with a bounded wait (milliseconds)
    Blocking { timeout_ms: u64 },
}

impl Default for WaitKind {
    fn default() -> Self {
        Self::Sleep {
            micros: crate::params::audio_constants::WAIT_SLEEP_US,
        }
    }
}

impl WaitKind {
    pub fn build(self) -> Box<dyn WaitStrategy> {
        match self {
            Self::Sleep { micros } => Box::new(SleepWait::new(Duration::from_micros(micros))),
            Self::Yield => Box::new(YieldWait),
            Self::Blocking { timeout_ms } => {
                Box::new(CondvarWait::new(Duration::from_millis(timeout_ms)))
            }
        }
    }
}

/// Spin with a fixed sleep between polls
#[derive(Debug, Clone, Copy)]
pub struct SleepWait {
    interval: Duration,
}

impl SleepWait {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl WaitStrategy for SleepWait {
    fn wait(&self) {
        thread::sleep(self.interval);
    }
}

/// Spin yielding to the scheduler
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldWait;

impl WaitStrategy for YieldWait {
    fn wait(&self) {
        std::hint::spin_loop();
        thread::yield_now();
    }
}

/// Park on a condition variable until notified or `timeout` elapses.
///
/// The timeout bounds the cost of a wakeup that lands between the caller's
/// cursor check and the wait.
#[derive(Debug)]
pub struct CondvarWait {
    generation: Mutex<u64>,
    signal: Condvar,
    timeout: Duration,
}

impl CondvarWait {
    pub fn new(timeout: Duration) -> Self {
        Self {
            generation: Mutex::new(0),
            signal: Condvar::new(),
            timeout,
        }
    }
}

impl WaitStrategy for CondvarWait {
    fn wait(&self) {
        let guard = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let seen = *guard;
        let _ = self
            .signal
            .wait_timeout_while(guard, self.timeout, |g| *g == seen);
    }

    fn notify(&self) {
        let mut guard = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = guard.wrapping_add(1);
        self.signal.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_condvar_wait_times_out() {
        let wait = CondvarWait::new(Duration::from_millis(5));
        let start = Instant::now();
        wait.wait();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn test_condvar_notify_wakes_waiter() {
        let wait = Arc::new(CondvarWait::new(Duration::from_secs(10)));
        let waiter = Arc::clone(&wait);

        let start = Instant::now();
        let handle = thread::spawn(move || waiter.wait());
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && Instant::now() < deadline {
            wait.notify();
            thread::sleep(Duration::from_millis(1));
        }
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_default_is_short_sleep() {
        assert_eq!(WaitKind::default(), WaitKind::Sleep { micros: 10 });
    }
}
