//! Splitting a record count into bulk calls of page cursors

use super::config::{
    ListingSettings, DEFAULT_MAX_ITEMS_PER_REQUEST, MAX_ITEMS_PER_BULK_CALL,
    MAX_SUB_REQUESTS_PER_BULK_CALL, PER_BULK_ITEM_CAP,
};
use crate::Cursor;

/// Plans the bulk calls needed to read `total_count` records
#[derive(Debug, Clone, Copy)]
pub struct PageBatcher {
    max_items_per_request: usize,
}

impl PageBatcher {
    /// Create a batcher for the given settings
    pub fn new(settings: &ListingSettings) -> Self {
        let max_items_per_request = match settings.max_items_per_request {
            0 => DEFAULT_MAX_ITEMS_PER_REQUEST,
            n => n.min(MAX_ITEMS_PER_BULK_CALL),
        };
        Self {
            max_items_per_request,
        }
    }

    /// Records requested per bulk call after clamping
    pub fn max_items_per_request(&self) -> usize {
        self.max_items_per_request
    }

    /// One inner vector per bulk call, one cursor per sub-request
    ///
    /// Page numbers are 1-based and consecutive across batches. The cursors
    /// cover at least `total_count` records.
    pub fn compute_batches(&self, total_count: usize) -> Vec<Vec<Cursor>> {
        let mut batches = Vec::new();
        let mut remaining = total_count;
        let mut next_page = 1;

        while remaining > 0 {
            let to_fetch = remaining.min(self.max_items_per_request);
            let sub_requests =
                ceil_div(to_fetch, PER_BULK_ITEM_CAP).min(MAX_SUB_REQUESTS_PER_BULK_CALL);
            let page_size = ceil_div(self.max_items_per_request, sub_requests)
                .min(PER_BULK_ITEM_CAP)
                .max(1);

            let mut batch = Vec::with_capacity(sub_requests);
            for _ in 0..sub_requests {
                batch.push(Cursor::new(page_size, next_page));
                next_page += 1;
                remaining = remaining.saturating_sub(page_size);
            }
            batches.push(batch);
        }

        batches
    }
}

/// Plan the bulk calls for `total_count` records
pub fn compute_batches(total_count: usize, settings: &ListingSettings) -> Vec<Vec<Cursor>> {
    PageBatcher::new(settings).compute_batches(total_count)
}

fn ceil_div(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}
