//! The bulk-fetch engine
//!
//! A fetch call moves through these phases:
//!
//! 1. **Counting** - one throttled count request sizes the listing
//! 2. **Batching** - [`PageBatcher`] turns the count into bulk calls of page cursors
//! 3. **Fetching** - [`FetchWorker`]s pull from one shared batch queue; [`StreamMerger`] fans their output in
//! 4. **Draining** - all batches are dispatched, workers finish the last ones
//! 5. **Closed** - every merge pump has finished and the output stream ends

use futures_util::stream::Stream;
use std::fmt;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::source::ApiError;
use crate::Item;

pub mod batcher;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod group;
pub mod merge;
pub mod rate_limit;
pub mod worker;

pub use batcher::{compute_batches, PageBatcher};
pub use config::ListingSettings;
pub use dispatch::{BatchDispatcher, SharedBatches};
pub use engine::Lister;
pub use group::group_items;
pub use merge::StreamMerger;
pub use rate_limit::RateLimiter;
pub use worker::FetchWorker;

/// Listing failures delivered inside stream items
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ListingError {
    /// The count request failed; the stream ends after this item
    #[error("count request failed: {0}")]
    Count(#[source] ApiError),

    /// One bulk call failed; the other batches continue
    #[error("page read failed: {0}")]
    PageRead(#[source] ApiError),
}

impl ListingError {
    /// Underlying API error
    pub fn api_error(&self) -> &ApiError {
        match self {
            ListingError::Count(e) | ListingError::PageRead(e) => e,
        }
    }
}

/// Stream of listing items
pub type ItemStream<T> = Pin<Box<dyn Stream<Item = Item<T>> + Send>>;

/// Stream of item groups
pub type GroupedItemStream<T> = Pin<Box<dyn Stream<Item = Vec<Item<T>>> + Send>>;

/// Lifecycle phase of one fetch call, used in log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    /// Waiting for the count request
    Counting,
    /// Planning bulk calls
    Batching,
    /// Workers are reading pages
    Fetching,
    /// All batches dispatched
    Draining,
    /// Output stream closed
    Closed,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchPhase::Counting => "counting",
            FetchPhase::Batching => "batching",
            FetchPhase::Fetching => "fetching",
            FetchPhase::Draining => "draining",
            FetchPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Expose a channel receiver as a boxed stream
pub(crate) fn receiver_stream<T: Send + 'static>(rx: mpsc::Receiver<T>) -> Pin<Box<dyn Stream<Item = T> + Send>> {
    Box::pin(ReceiverStream::new(rx))
}
