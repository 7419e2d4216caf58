//! Cancellation coordination for fetch calls.
//!
//! A [`CancelSignal`] is handed to [`crate::Lister::fetch`] and cloned into
//! every task of that call: the batch dispatcher, each fetch worker, each merge
//! pump and the grouping task. Cancelling any clone stops all of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct SignalState {
    is_cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation handle; all clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    state: Arc<SignalState>,
}

impl CancelSignal {
    /// Create a signal that is not cancelled yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Wakes all waiters exactly once.
    pub fn cancel(&self) {
        if !self.state.is_cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is requested. Returns immediately if already set.
    ///
    /// The waiter is registered before the flag is checked, so a `cancel()`
    /// racing this call cannot be missed.
    pub async fn cancelled(&self) {
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}
