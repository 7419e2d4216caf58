//! Unit tests for bulk call planning

use bulk_lister::lister::compute_batches;
use bulk_lister::lister::config::{MAX_SUB_REQUESTS_PER_BULK_CALL, PER_BULK_ITEM_CAP};
use bulk_lister::{Cursor, ListingSettings};

fn settings(max_items_per_request: usize) -> ListingSettings {
    ListingSettings {
        max_items_per_request,
        ..Default::default()
    }
}

fn cursors(limit: usize, pages: std::ops::RangeInclusive<usize>) -> Vec<Cursor> {
    pages.map(|page| Cursor::new(limit, page)).collect()
}

#[test]
fn test_ten_records_two_per_call() {
    let batches = compute_batches(10, &settings(2));

    assert_eq!(batches.len(), 5);
    for (idx, batch) in batches.iter().enumerate() {
        assert_eq!(batch, &vec![Cursor::new(2, idx + 1)]);
    }
}

#[test]
fn test_full_bulk_call_plus_one_record() {
    let batches = compute_batches(10_001, &settings(10_000));

    assert_eq!(batches, vec![cursors(100, 1..=100), vec![Cursor::new(100, 101)]]);
}

#[test]
fn test_thousand_records() {
    assert_eq!(compute_batches(1_000, &settings(10_000)), vec![cursors(100, 1..=10)]);
}

#[test]
fn test_oversized_request_is_clamped() {
    assert_eq!(compute_batches(100, &settings(10_001)), vec![vec![Cursor::new(100, 1)]]);
}

#[test]
fn test_uneven_split_across_sub_requests() {
    // 150 per call over two sub-requests: pages of 75
    let batches = compute_batches(300, &settings(150));

    assert_eq!(batches, vec![cursors(75, 1..=2), cursors(75, 3..=4)]);
}

#[test]
fn test_every_batch_respects_remote_caps() {
    let batches = compute_batches(123_456, &settings(10_000));

    assert_eq!(batches.len(), 13);
    assert!(batches.iter().all(|b| b.len() <= MAX_SUB_REQUESTS_PER_BULK_CALL));
    assert!(batches.iter().flatten().all(|c| c.limit == PER_BULK_ITEM_CAP));
    let covered: usize = batches.iter().flatten().map(|c| c.limit).sum();
    assert!(covered >= 123_456);
}
