//! Integration tests for cancellation and early consumer exit

use std::sync::Arc;
use std::time::Duration;

use bulk_lister::{CancelSignal, Filters, Lister, ListingSettings};
use futures_util::StreamExt;

use crate::support::MockSource;

fn lister(source: Arc<MockSource>) -> Lister<Arc<MockSource>> {
    Lister::new(
        ListingSettings {
            max_items_per_request: 10,
            max_fetchers: 4,
            stream_buffer_size: 1,
            ..Default::default()
        },
        source,
    )
}

#[tokio::test]
async fn test_cancel_mid_stream_closes_stream() {
    let source = Arc::new(MockSource::with_total(100_000));
    let cancel = CancelSignal::new();
    let mut items = lister(source.clone()).fetch(cancel.clone(), Filters::new()).await;

    for _ in 0..5 {
        assert!(items.next().await.is_some());
    }
    cancel.cancel();

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        let mut rest = 0usize;
        while items.next().await.is_some() {
            rest += 1;
        }
        rest
    })
    .await;

    let rest = drained.expect("stream did not close after cancellation");
    assert!(rest < 100_000);
    assert!(source.read_calls().len() < 10_000);
}

#[tokio::test]
async fn test_cancel_before_fetch_yields_nothing() {
    let source = Arc::new(MockSource::with_total(50));
    let cancel = CancelSignal::new();
    cancel.cancel();

    let items = tokio::time::timeout(
        Duration::from_secs(1),
        lister(source.clone()).fetch(cancel, Filters::new()),
    )
    .await
    .expect("fetch blocked after cancellation");

    let collected: Vec<_> = items.collect().await;
    assert!(collected.is_empty());
    assert!(source.read_calls().is_empty());
}

#[tokio::test]
async fn test_cancel_grouped_fetch_closes_stream() {
    let source = Arc::new(MockSource::with_total(100_000).slow_reads(Duration::from_millis(5)));
    let cancel = CancelSignal::new();
    let mut groups = lister(source)
        .fetch_grouped(cancel.clone(), Filters::new(), 7)
        .await;

    assert!(groups.next().await.is_some());
    cancel.cancel();

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while groups.next().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok());
}

#[tokio::test]
async fn test_dropping_stream_stops_reads() {
    let source = Arc::new(MockSource::with_total(100_000));
    let mut items = lister(source.clone()).fetch(CancelSignal::new(), Filters::new()).await;

    assert!(items.next().await.is_some());
    drop(items);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = source.read_calls().len();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(source.read_calls().len(), settled);
    assert!(settled < 10_000);
}
