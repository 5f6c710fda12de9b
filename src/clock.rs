//! Monotonic time source injected into the connectivity manager

use std::time::{Duration, Instant};

/// Time source used for phase timeouts and settle delays
pub trait Clock {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Block the calling thread for a short bounded pause
    fn sleep(&self, duration: Duration);

    /// Time elapsed since `earlier`, saturating at zero
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Wall clock backed by `Instant::now` and `thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
