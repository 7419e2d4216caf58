//! Connect retries with linear backoff and session invalidation
//!
//! [`ConnectionRetrier::run`] calls `connect` up to `attempts` times. When a
//! failure says the session expired, `on_session_expired` runs before the
//! next attempt so the following connect can pick up a fresh session.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::source::ApiError;

/// Default number of connect attempts
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

/// Default delay before the first retry (milliseconds)
pub const DEFAULT_CONNECT_INTERVAL_MS: u64 = 1000;

/// Default backoff coefficient
pub const DEFAULT_BACKOFF_COEFF: u32 = 2;

/// Errors that can tell whether they were caused by an expired session
pub trait SessionExpiry {
    /// Whether a new session is needed before retrying
    fn is_session_expired(&self) -> bool;
}

impl SessionExpiry for ApiError {
    fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

/// Retries a connect operation with linear backoff
#[derive(Clone)]
pub struct ConnectionRetrier {
    attempts: u32,
    interval: Duration,
    backoff_coeff: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for ConnectionRetrier {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONNECT_ATTEMPTS,
            Duration::from_millis(DEFAULT_CONNECT_INTERVAL_MS),
            DEFAULT_BACKOFF_COEFF,
        )
    }
}

impl ConnectionRetrier {
    /// Create a retrier
    ///
    /// # Arguments
    /// * `attempts` - Maximum number of connect calls
    /// * `interval` - Base delay between attempts
    /// * `backoff_coeff` - Linear growth of the delay per attempt
    pub fn new(attempts: u32, interval: Duration, backoff_coeff: u32) -> Self {
        Self {
            attempts,
            interval,
            backoff_coeff,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Sleep through `sleeper` between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Maximum number of connect calls
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay after the failed attempt with 0-based index `attempt`
    ///
    /// `interval × (backoff_coeff × attempt + 1)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_coeff
            .saturating_mul(attempt)
            .saturating_add(1);
        self.interval.saturating_mul(factor)
    }

    /// Call `connect` until it succeeds or the attempts run out
    ///
    /// Returns the last connect error once every attempt failed, or the error
    /// of `on_session_expired` if that fails. No delay follows the last attempt.
    pub async fn run<E, C, CF, X, XF>(&self, mut connect: C, mut on_session_expired: X) -> Result<(), E>
    where
        E: SessionExpiry + Display,
        C: FnMut() -> CF,
        CF: Future<Output = Result<(), E>>,
        X: FnMut() -> XF,
        XF: Future<Output = Result<(), E>>,
    {
        let mut last_error = None;

        for attempt in 0..self.attempts {
            match connect().await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(attempt = attempt + 1, "Connected after retrying");
                    }
                    return Ok(());
                }
                Err(e) if e.is_session_expired() => {
                    warn!(
                        attempt = attempt + 1,
                        attempts = self.attempts,
                        error = %e,
                        "Session expired, invalidating it"
                    );
                    on_session_expired().await?;
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        attempts = self.attempts,
                        error = %e,
                        "Connect attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt + 1 < self.attempts {
                let delay = self.backoff_delay(attempt);
                debug!("Retrying connect after {:?}", delay);
                metrics::record_connect_retry(delay, attempt + 1);
                self.sleeper.sleep(delay).await;
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ConnectionRetrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRetrier")
            .field("attempts", &self.attempts)
            .field("interval", &self.interval)
            .field("backoff_coeff", &self.backoff_coeff)
            .finish_non_exhaustive()
    }
}
