//! Shared test doubles

#![allow(dead_code)]

use async_trait::async_trait;
use bulk_lister::sleeper::Sleeper;
use bulk_lister::source::{ApiError, ApiResult, BulkDataSource};
use bulk_lister::{Filters, LIMIT_FILTER, OFFSET_FILTER};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory source holding records `0..total`
///
/// Page `p` of size `n` holds records `(p - 1) * n .. p * n`.
#[derive(Default)]
pub struct MockSource {
    pub total: usize,
    pub count_error: Option<ApiError>,
    pub failing_pages: HashSet<usize>,
    pub read_delay: Option<Duration>,
    pub page_delays: HashMap<usize, Duration>,
    pub counts: Mutex<Vec<Filters>>,
    pub reads: Mutex<Vec<Vec<Filters>>>,
}

impl MockSource {
    pub fn with_total(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn failing_count(error: ApiError) -> Self {
        Self {
            count_error: Some(error),
            ..Default::default()
        }
    }

    pub fn fail_pages(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.failing_pages.extend(pages);
        self
    }

    pub fn slow_reads(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Delay every bulk call that contains `page`
    pub fn slow_page(mut self, page: usize, delay: Duration) -> Self {
        self.page_delays.insert(page, delay);
        self
    }

    pub fn read_calls(&self) -> Vec<Vec<Filters>> {
        self.reads.lock().unwrap().clone()
    }

    pub fn count_calls(&self) -> Vec<Filters> {
        self.counts.lock().unwrap().clone()
    }

    /// Page numbers requested so far, sorted
    pub fn requested_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self
            .read_calls()
            .iter()
            .flatten()
            .map(|filters| page_param(filters, OFFSET_FILTER))
            .collect();
        pages.sort_unstable();
        pages
    }
}

pub fn page_param(filters: &Filters, key: &str) -> usize {
    filters
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or_else(|| panic!("missing {key} in {filters:?}"))
}

#[async_trait]
impl BulkDataSource for MockSource {
    type Record = usize;

    async fn count(&self, filters: &Filters) -> ApiResult<usize> {
        self.counts.lock().unwrap().push(filters.clone());
        match &self.count_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.total),
        }
    }

    async fn read(
        &self,
        bulk_filters: &[Filters],
        on_item: &mut (dyn FnMut(usize) + Send),
    ) -> ApiResult<()> {
        self.reads.lock().unwrap().push(bulk_filters.to_vec());
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        for filters in bulk_filters {
            if let Some(delay) = self.page_delays.get(&page_param(filters, OFFSET_FILTER)) {
                tokio::time::sleep(*delay).await;
            }
        }

        let mut records = Vec::new();
        for filters in bulk_filters {
            let page = page_param(filters, OFFSET_FILTER);
            let limit = page_param(filters, LIMIT_FILTER);
            if self.failing_pages.contains(&page) {
                return Err(ApiError::Http(format!("page {page} failed")));
            }
            let start = (page - 1) * limit;
            records.extend((start..start + limit).filter(|id| *id < self.total));
        }

        for record in records {
            on_item(record);
        }
        Ok(())
    }
}

/// Sleeper that records requested durations and returns at once
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
