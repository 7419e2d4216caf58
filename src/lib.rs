//! # Bulk Lister
//!
//! A paginated bulk-fetch engine for record-oriented APIs that expose
//! rate-limited "list" methods and a "bulk" endpoint bundling several
//! sub-requests into one HTTP call.
//!
//! ## Features
//!
//! - **Bulk Batching**: Splits "all records matching F" into page cursors packed
//!   into as few bulk calls as the remote caps allow
//! - **Concurrent Fetching**: A bounded pool of fetch workers fed round-robin
//! - **Backpressure**: Bounded channels all the way down, a slow consumer slows the producers
//! - **Rate Limiting**: Per-second request ceiling shared by every worker of a lister
//! - **Cancellation**: One signal stops the whole call tree without blocked sends
//! - **Session Recovery**: [`ConnectionRetrier`] retries connects with linear backoff
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_lister::{CancelSignal, Filters, Lister, ListingSettings};
//! use bulk_lister::source::{BulkHttpClient, RecordListing, StaticSession};
//! use futures_util::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(StaticSession::new("session-key"));
//! let client = BulkHttpClient::new("https://api.example.com/", "client-code", session)?;
//! let source = RecordListing::<serde_json::Value>::new(Arc::new(client), "getCustomers");
//!
//! let lister = Lister::new(ListingSettings::default(), source);
//! let mut items = lister.fetch(CancelSignal::new(), Filters::new()).await;
//! while let Some(item) = items.next().await {
//!     if let Some(err) = item.error {
//!         eprintln!("page failed: {err}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`lister`] - Page batching, throttling, fetch workers, stream merging and the façade
//! - [`source`] - The [`BulkDataSource`] seam and its HTTP implementation
//! - [`connection`] - Connect retries with session invalidation
//! - [`cancel`] - Cancellation signal shared by one fetch call
//! - [`cli`] - Command line front-end streaming one listing as NDJSON

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cancellation signal for fetch calls
pub mod cancel;

/// CLI command implementation
pub mod cli;

/// Connect retries with session invalidation
pub mod connection;

/// The bulk-fetch engine
pub mod lister;

/// Metrics emitted by the engine and the HTTP source
pub mod metrics;

/// Injectable sleeping
pub mod sleeper;

/// Data sources for the engine
pub mod source;

// Re-export commonly used types
pub use cancel::CancelSignal;
pub use connection::{ConnectionRetrier, SessionExpiry};
pub use lister::{
    GroupedItemStream, ItemStream, Lister, ListingError, ListingSettings, RateLimiter,
};
pub use source::{ApiError, BulkDataSource};

/// Filter parameters of one request, keyed by remote parameter name
pub type Filters = BTreeMap<String, serde_json::Value>;

/// Filter key carrying a cursor's page size
pub const LIMIT_FILTER: &str = "recordsOnPage";

/// Filter key carrying a cursor's 1-based page number
pub const OFFSET_FILTER: &str = "pageNo";

/// One page of records to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// Page size
    pub limit: usize,
    /// 1-based page number
    pub offset: usize,
}

impl Cursor {
    /// Create a cursor
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Merge this cursor into a copy of `base`, overriding any previous paging keys
    pub fn apply(&self, base: &Filters) -> Filters {
        let mut filters = base.clone();
        filters.insert(LIMIT_FILTER.to_string(), self.limit.into());
        filters.insert(OFFSET_FILTER.to_string(), self.offset.into());
        filters
    }
}

/// One element of a listing stream
///
/// Error items carry no payload. Every item carries the total count known when
/// the owning fetch started, so consumers can report progress.
#[derive(Debug)]
pub struct Item<T> {
    /// Set when a count or page request failed
    pub error: Option<ListingError>,
    /// Number of matching records reported by the count request
    pub total_count: usize,
    /// The decoded record
    pub payload: Option<T>,
}

impl<T> Item<T> {
    /// Item carrying a decoded record
    pub fn record(payload: T, total_count: usize) -> Self {
        Self {
            error: None,
            total_count,
            payload: Some(payload),
        }
    }

    /// Item carrying an error
    pub fn failure(error: ListingError, total_count: usize) -> Self {
        Self {
            error: Some(error),
            total_count,
            payload: None,
        }
    }

    /// Whether this item reports a failure
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}
