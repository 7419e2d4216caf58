//! Fetch workers: one bulk call per batch, one item per record.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::rate_limit::RateLimiter;
use super::dispatch::SharedBatches;
use super::ListingError;
use crate::metrics;
use crate::source::BulkDataSource;
use crate::{CancelSignal, Filters, Item};

/// Pulls batches from the shared queue and emits their records
///
/// One bulk response is collected in memory before its records are sent, so
/// a worker blocked on a full output channel holds at most one batch worth of
/// records and does not issue its next bulk call until the consumer catches up.
pub struct FetchWorker<S: BulkDataSource> {
    id: usize,
    source: Arc<S>,
    limiter: Arc<RateLimiter>,
    base_filters: Arc<Filters>,
    total_count: usize,
    cancel: CancelSignal,
}

impl<S: BulkDataSource> FetchWorker<S> {
    /// Create a worker
    ///
    /// # Arguments
    /// * `id` - Worker index, used in logs
    /// * `source` - Source executing the bulk calls
    /// * `limiter` - Limiter shared with the other workers of the call
    /// * `base_filters` - Caller filters every cursor is merged into
    /// * `total_count` - Count reported for the call, copied into every item
    /// * `cancel` - Signal of the owning call
    pub fn new(
        id: usize,
        source: Arc<S>,
        limiter: Arc<RateLimiter>,
        base_filters: Arc<Filters>,
        total_count: usize,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            id,
            source,
            limiter,
            base_filters,
            total_count,
            cancel,
        }
    }

    /// Run the worker on its own task
    ///
    /// Returns the receiving end of the worker's output channel, bounded at
    /// `buffer_size`, and the task handle.
    pub fn spawn(
        self,
        batches: SharedBatches,
        buffer_size: usize,
    ) -> (mpsc::Receiver<Item<S::Record>>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let handle = tokio::spawn(self.run(batches, tx));
        (rx, handle)
    }

    async fn run(self, batches: SharedBatches, output: mpsc::Sender<Item<S::Record>>) {
        let mut processed = 0usize;

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                batch = batches.next() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            if !self.fetch_batch(&batch, &output).await {
                break;
            }
            processed += 1;
        }

        debug!(
            worker = self.id,
            batches = processed,
            cancelled = self.cancel.is_cancelled(),
            "Fetch worker finished"
        );
    }

    /// Read one batch. Returns false once the worker should stop.
    async fn fetch_batch(&self, batch: &[crate::Cursor], output: &mpsc::Sender<Item<S::Record>>) -> bool {
        let bulk_filters: Vec<Filters> = batch
            .iter()
            .map(|cursor| cursor.apply(&self.base_filters))
            .collect();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            _ = self.limiter.throttle() => {}
        }

        let mut records = Vec::new();
        let result = {
            let mut collect = |record: S::Record| records.push(record);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                result = self.source.read(&bulk_filters, &mut collect) => result,
            }
        };

        match result {
            Ok(()) => {
                let count = records.len();
                for record in records {
                    if !self.emit(output, Item::record(record, self.total_count)).await {
                        return false;
                    }
                }
                metrics::record_items_emitted(count as u64);
                true
            }
            Err(e) => {
                warn!(
                    worker = self.id,
                    first_page = batch.first().map(|c| c.offset),
                    pages = batch.len(),
                    error = %e,
                    "Bulk read failed"
                );
                self.emit(output, Item::failure(ListingError::PageRead(e), self.total_count))
                    .await
            }
        }
    }

    /// Send one item unless the call was cancelled. Returns false once the worker should stop.
    async fn emit(&self, output: &mpsc::Sender<Item<S::Record>>, item: Item<S::Record>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = output.send(item) => sent.is_ok(),
        }
    }
}
