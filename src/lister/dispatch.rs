//! Distribution of bulk batches to fetch workers.
//!
//! One producer task feeds a single bounded channel. Every worker of the call
//! pulls from the same receiving end, so an idle worker always picks up the
//! next batch while a sibling is stuck on a slow page.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::FetchPhase;
use crate::{CancelSignal, Cursor};

/// Cursors of one bulk call
pub type Batch = Vec<Cursor>;

/// Receiving end of the batch channel, cloned into every worker
///
/// Each batch is taken by exactly one worker.
#[derive(Clone)]
pub struct SharedBatches {
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
}

impl SharedBatches {
    /// Take the next batch, or `None` once the producer is done and the queue is empty
    pub async fn next(&self) -> Option<Batch> {
        self.rx.lock().await.recv().await
    }
}

/// Producer side of the batch channel
pub struct BatchDispatcher {
    tx: mpsc::Sender<Batch>,
}

impl BatchDispatcher {
    /// Create the channel with room for `queue_depth` pending batches.
    pub fn new(queue_depth: usize) -> (Self, SharedBatches) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let batches = SharedBatches {
            rx: Arc::new(Mutex::new(rx)),
        };
        (Self { tx }, batches)
    }

    /// Queue a batch for whichever worker asks first.
    ///
    /// Returns `Err(batch)` once every worker is gone.
    pub async fn send(&self, batch: Batch) -> Result<(), Batch> {
        trace!(
            cursors = batch.len(),
            first_page = batch.first().map(|c| c.offset),
            "Queueing batch"
        );
        self.tx.send(batch).await.map_err(|e| e.0)
    }

    /// Feed `batches` to the workers from a background task.
    ///
    /// Stops early on cancellation or when every worker is gone. Dropping the
    /// dispatcher at the end closes the batch channel.
    pub fn spawn_dispatch(self, batches: Vec<Batch>, cancel: CancelSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let total = batches.len();
            let mut queued = 0usize;

            for batch in batches {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = self.send(batch) => sent,
                };
                if sent.is_err() {
                    debug!("Workers gone, stopping batch dispatch");
                    break;
                }
                queued += 1;
            }

            debug!(
                phase = %FetchPhase::Draining,
                queued = queued,
                total = total,
                "Batch dispatch finished"
            );
        })
    }
}
