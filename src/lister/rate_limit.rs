//! Per-second request ceiling shared by all workers of a lister
//!
//! Calls are counted per wall-clock second, starting from the second the
//! limiter was created in. The caller that spends the budget sleeps a full
//! second while holding the lock, so concurrent callers queue behind it. This
//! is not a sliding window.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::metrics;
use crate::sleeper::{Sleeper, TokioSleeper};

/// Time waited once the per-second budget is spent
pub const THROTTLE_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Window {
    second: i64,
    requests: u32,
}

impl Window {
    fn starting_at(second: i64) -> Self {
        Self { second, requests: 0 }
    }
}

/// Bounds outbound calls per wall-clock second
pub struct RateLimiter {
    max_requests_per_second: u32,
    window: Mutex<Window>,
    sleeper: Arc<dyn Sleeper>,
    clock: fn() -> i64,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests_per_second` calls, 0 for unlimited
    pub fn new(max_requests_per_second: u32) -> Self {
        Self::with_sleeper(max_requests_per_second, Arc::new(TokioSleeper))
    }

    /// Create a limiter that never blocks
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Create a limiter that sleeps through `sleeper`
    pub fn with_sleeper(max_requests_per_second: u32, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            max_requests_per_second,
            window: Mutex::new(Window::starting_at(current_second())),
            sleeper,
            clock: current_second,
        }
    }

    /// Replace the wall clock, returning whole seconds
    ///
    /// The current window restarts at the new clock's second.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self.window = Mutex::new(Window::starting_at(clock()));
        self
    }

    /// Configured ceiling, 0 when unlimited
    pub fn max_requests_per_second(&self) -> u32 {
        self.max_requests_per_second
    }

    /// Wait until one more call may be issued
    pub async fn throttle(&self) {
        if self.max_requests_per_second == 0 {
            return;
        }

        let mut window = self.window.lock().await;
        let now = (self.clock)();
        window.requests = window.requests.saturating_add(1);

        if window.second != now {
            window.second = now;
            window.requests = 1;
            return;
        }

        if window.requests >= self.max_requests_per_second {
            metrics::record_throttle_wait(THROTTLE_WAIT);
            self.sleeper.sleep(THROTTLE_WAIT).await;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests_per_second", &self.max_requests_per_second)
            .finish_non_exhaustive()
    }
}

fn current_second() -> i64 {
    chrono::Utc::now().timestamp()
}
