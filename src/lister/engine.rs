//! The [`Lister`] façade

use futures_util::stream;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::batcher::PageBatcher;
use super::config::{ListingSettings, BATCH_QUEUE_DEPTH};
use super::dispatch::BatchDispatcher;
use super::group::group_items;
use super::merge::StreamMerger;
use super::rate_limit::RateLimiter;
use super::worker::FetchWorker;
use super::{receiver_stream, FetchPhase, GroupedItemStream, ItemStream, ListingError};
use crate::source::{ApiResult, BulkDataSource};
use crate::{CancelSignal, Cursor, Filters, Item};

/// Lists every record matching a filter through bulk calls
///
/// A lister is long-lived: its settings are fixed at construction and its
/// rate limiter is shared by every call made through it.
pub struct Lister<S: BulkDataSource> {
    settings: ListingSettings,
    source: Arc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S: BulkDataSource> Lister<S> {
    /// Create a lister with its own rate limiter
    pub fn new(settings: ListingSettings, source: S) -> Self {
        let limiter = Arc::new(RateLimiter::new(settings.max_requests_per_second));
        Self::with_rate_limiter(settings, source, limiter)
    }

    /// Create a lister sharing `limiter` with other listers
    pub fn with_rate_limiter(settings: ListingSettings, source: S, limiter: Arc<RateLimiter>) -> Self {
        Self {
            settings: settings.with_defaults(),
            source: Arc::new(source),
            limiter,
        }
    }

    /// Effective settings
    pub fn settings(&self) -> &ListingSettings {
        &self.settings
    }

    /// The rate limiter shared by all calls of this lister
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Count matching records, throttled like any other call
    pub async fn count(&self, filters: &Filters) -> ApiResult<usize> {
        self.limiter.throttle().await;
        self.source.count(&Cursor::new(1, 1).apply(filters)).await
    }

    /// Stream every record matching `filters`
    ///
    /// Returns once the count is known; pages are fetched while the stream is
    /// consumed. A failed count yields a single error item. A failed bulk call
    /// yields one error item and the other batches continue. Cancelling
    /// `cancel` ends the stream early.
    pub async fn fetch(&self, cancel: CancelSignal, filters: Filters) -> ItemStream<S::Record> {
        debug!(phase = %FetchPhase::Counting, "Counting records");
        let counted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Fetch cancelled before the count completed");
                return Box::pin(stream::empty());
            }
            counted = self.count(&filters) => counted,
        };

        let total_count = match counted {
            Ok(total_count) => total_count,
            Err(e) => {
                warn!(error = %e, "Count request failed");
                let failure = Item::failure(ListingError::Count(e), 0);
                return Box::pin(stream::iter(std::iter::once(failure)));
            }
        };

        debug!(phase = %FetchPhase::Batching, total_count = total_count, "Planning bulk calls");
        let batches = PageBatcher::new(&self.settings).compute_batches(total_count);
        if batches.is_empty() {
            debug!(phase = %FetchPhase::Closed, "Nothing to fetch");
            return Box::pin(stream::empty());
        }

        let worker_count = self.settings.max_fetchers.min(batches.len()).max(1);
        let capacity = self.settings.channel_capacity();
        info!(
            phase = %FetchPhase::Fetching,
            total_count = total_count,
            bulk_calls = batches.len(),
            workers = worker_count,
            "Fetching records"
        );

        let (dispatcher, shared) = BatchDispatcher::new(BATCH_QUEUE_DEPTH);
        let base_filters = Arc::new(Cursor::new(1, 1).apply(&filters));

        let outputs = (0..worker_count)
            .map(|id| {
                let worker = FetchWorker::new(
                    id,
                    self.source.clone(),
                    self.limiter.clone(),
                    base_filters.clone(),
                    total_count,
                    cancel.clone(),
                );
                let (output, _handle) = worker.spawn(shared.clone(), capacity);
                output
            })
            .collect();

        drop(shared);
        dispatcher.spawn_dispatch(batches, cancel.clone());

        let merged = StreamMerger::new(capacity, cancel).merge(outputs);
        receiver_stream(merged)
    }

    /// Like [`Lister::fetch`], delivering items in groups of `group_size`
    ///
    /// The last group may be smaller. A `group_size` of 0 is treated as 1.
    pub async fn fetch_grouped(
        &self,
        cancel: CancelSignal,
        filters: Filters,
        group_size: usize,
    ) -> GroupedItemStream<S::Record> {
        let items = self.fetch(cancel.clone(), filters).await;
        group_items(items, group_size, self.settings.max_fetchers, cancel)
    }
}
