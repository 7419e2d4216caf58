//! Integration tests for request throttling

use std::sync::Arc;
use std::time::Duration;

use bulk_lister::lister::rate_limit::THROTTLE_WAIT;
use bulk_lister::{CancelSignal, Filters, Lister, ListingSettings, RateLimiter};
use futures_util::StreamExt;

use crate::support::{MockSource, RecordingSleeper};

fn frozen_clock() -> i64 {
    1_700_000_000
}

fn settings(max_requests_per_second: u32) -> ListingSettings {
    ListingSettings {
        max_requests_per_second,
        max_items_per_request: 2,
        max_fetchers: 2,
        stream_buffer_size: 4,
    }
}

#[tokio::test]
async fn test_calls_over_ceiling_are_delayed() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let limiter = Arc::new(RateLimiter::with_sleeper(2, sleeper.clone()).with_clock(frozen_clock));
    let source = Arc::new(MockSource::with_total(10));
    let lister = Lister::with_rate_limiter(settings(2), source.clone(), limiter);
    assert_eq!(lister.rate_limiter().max_requests_per_second(), 2);
    assert_eq!(lister.settings().max_fetchers, 2);

    let items: Vec<_> = lister.fetch(CancelSignal::new(), Filters::new()).await.collect().await;

    assert_eq!(items.len(), 10);
    // One count and five bulk calls went through the limiter
    assert_eq!(source.count_calls().len() + source.read_calls().len(), 6);
    let sleeps = sleeper.sleeps();
    assert!(!sleeps.is_empty());
    assert!(sleeps.iter().all(|d| *d == THROTTLE_WAIT));
}

#[tokio::test]
async fn test_unlimited_never_delays() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let limiter = Arc::new(RateLimiter::with_sleeper(0, sleeper.clone()).with_clock(frozen_clock));
    let lister = Lister::with_rate_limiter(settings(0), Arc::new(MockSource::with_total(10)), limiter);

    let items: Vec<_> = lister.fetch(CancelSignal::new(), Filters::new()).await.collect().await;

    assert_eq!(items.len(), 10);
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_limiter_shared_between_listers() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let limiter = Arc::new(RateLimiter::with_sleeper(3, sleeper.clone()).with_clock(frozen_clock));

    let first = Lister::with_rate_limiter(settings(3), Arc::new(MockSource::with_total(2)), limiter.clone());
    let second = Lister::with_rate_limiter(settings(3), Arc::new(MockSource::with_total(2)), limiter.clone());
    assert!(Arc::ptr_eq(first.rate_limiter(), second.rate_limiter()));

    // Two calls each: count plus one bulk call, four calls within one second
    let _: Vec<_> = first.fetch(CancelSignal::new(), Filters::new()).await.collect().await;
    assert!(sleeper.sleeps().is_empty());
    let _: Vec<_> = second.fetch(CancelSignal::new(), Filters::new()).await.collect().await;
    assert!(!sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_real_clock_ceiling_delays_burst() {
    let limiter = Arc::new(RateLimiter::new(1));
    let lister = Lister::with_rate_limiter(settings(1), Arc::new(MockSource::with_total(4)), limiter);

    let start = std::time::Instant::now();
    let items: Vec<_> = lister.fetch(CancelSignal::new(), Filters::new()).await.collect().await;

    assert_eq!(items.len(), 4);
    assert!(start.elapsed() >= Duration::from_millis(900));
}
