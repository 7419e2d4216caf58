//! Integration tests for Lister::fetch_grouped

use std::sync::Arc;

use bulk_lister::source::ApiError;
use bulk_lister::{CancelSignal, Filters, Lister, ListingError, ListingSettings};
use futures_util::StreamExt;

use crate::support::MockSource;

fn lister(source: Arc<MockSource>) -> Lister<Arc<MockSource>> {
    Lister::new(
        ListingSettings {
            max_items_per_request: 2,
            max_fetchers: 2,
            stream_buffer_size: 2,
            ..Default::default()
        },
        source,
    )
}

#[tokio::test]
async fn test_groups_cover_every_record() {
    let source = Arc::new(MockSource::with_total(10));
    let groups: Vec<_> = lister(source)
        .fetch_grouped(CancelSignal::new(), Filters::new(), 3)
        .await
        .collect()
        .await;

    let lengths: Vec<usize> = groups.iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![3, 3, 3, 1]);

    let mut ids: Vec<usize> = groups.iter().flatten().filter_map(|item| item.payload).collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_group_larger_than_listing() {
    let source = Arc::new(MockSource::with_total(5));
    let groups: Vec<_> = lister(source)
        .fetch_grouped(CancelSignal::new(), Filters::new(), 100)
        .await
        .collect()
        .await;

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 5);
}

#[tokio::test]
async fn test_zero_group_size_yields_single_item_groups() {
    let source = Arc::new(MockSource::with_total(4));
    let groups: Vec<_> = lister(source)
        .fetch_grouped(CancelSignal::new(), Filters::new(), 0)
        .await
        .collect()
        .await;

    assert_eq!(groups.len(), 4);
    assert!(groups.iter().all(|group| group.len() == 1));
}

#[tokio::test]
async fn test_count_failure_arrives_as_one_group() {
    let source = Arc::new(MockSource::failing_count(ApiError::Http("boom".to_string())));
    let groups: Vec<_> = lister(source)
        .fetch_grouped(CancelSignal::new(), Filters::new(), 3)
        .await
        .collect()
        .await;

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 1);
    assert!(matches!(groups[0][0].error, Some(ListingError::Count(_))));
}
