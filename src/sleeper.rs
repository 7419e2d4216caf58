//! Sleeping behind a trait so throttling and retry delays can be observed in tests

use async_trait::async_trait;
use std::time::Duration;

/// Something that can suspend the current task for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
