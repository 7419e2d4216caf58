//! Listing configuration and remote API caps

use serde::{Deserialize, Serialize};

/// Maximum records the remote returns for one sub-request
pub const PER_BULK_ITEM_CAP: usize = 100;

/// Maximum sub-requests the remote accepts in one bulk call
pub const MAX_SUB_REQUESTS_PER_BULK_CALL: usize = 100;

/// Maximum records one bulk call can return
pub const MAX_ITEMS_PER_BULK_CALL: usize = PER_BULK_ITEM_CAP * MAX_SUB_REQUESTS_PER_BULK_CALL;

/// Default number of concurrent fetch workers
pub const DEFAULT_MAX_FETCHERS: usize = 1;

/// Default records per bulk call
pub const DEFAULT_MAX_ITEMS_PER_REQUEST: usize = MAX_ITEMS_PER_BULK_CALL;

/// Batches queued in the shared batch channel before dispatch blocks
pub const BATCH_QUEUE_DEPTH: usize = 1;

/// Tuning knobs of a [`crate::Lister`]
///
/// Zero means "use the default" for `max_fetchers` and
/// `max_items_per_request`, and "unlimited" for `max_requests_per_second`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSettings {
    /// Outbound calls allowed per wall-clock second, 0 disables throttling
    pub max_requests_per_second: u32,
    /// Capacity of every item channel, 0 is treated as 1
    pub stream_buffer_size: usize,
    /// Concurrent fetch workers per call
    pub max_fetchers: usize,
    /// Records requested per bulk call, capped at [`MAX_ITEMS_PER_BULK_CALL`]
    pub max_items_per_request: usize,
}

impl ListingSettings {
    /// Replace unset values with defaults and clamp to the remote caps
    pub fn with_defaults(mut self) -> Self {
        if self.max_fetchers == 0 {
            self.max_fetchers = DEFAULT_MAX_FETCHERS;
        }
        if self.max_items_per_request == 0 {
            self.max_items_per_request = DEFAULT_MAX_ITEMS_PER_REQUEST;
        }
        self.max_items_per_request = self.max_items_per_request.min(MAX_ITEMS_PER_BULK_CALL);
        self
    }

    /// Capacity used for item channels
    pub fn channel_capacity(&self) -> usize {
        self.stream_buffer_size.max(1)
    }
}
