//! Re-chunking an item stream into fixed-size groups

use futures_util::StreamExt;
use std::mem;
use tokio::sync::mpsc;
use tracing::debug;

use super::{receiver_stream, GroupedItemStream, ItemStream};
use crate::{CancelSignal, Item};

/// Collect `items` into groups of `group_size`
///
/// The last group may be smaller; it is delivered when `items` ends. A
/// `group_size` of 0 is treated as 1. The returned stream buffers up to
/// `buffer_size` groups.
pub fn group_items<T: Send + 'static>(
    mut items: ItemStream<T>,
    group_size: usize,
    buffer_size: usize,
    cancel: CancelSignal,
) -> GroupedItemStream<T> {
    let group_size = group_size.max(1);
    let (tx, rx) = mpsc::channel(buffer_size.max(1));

    tokio::spawn(async move {
        let mut group: Vec<Item<T>> = Vec::with_capacity(group_size);
        let mut groups = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = items.next() => next,
            };
            let Some(item) = next else { break };

            group.push(item);
            if group.len() == group_size {
                let full = mem::replace(&mut group, Vec::with_capacity(group_size));
                if !send_group(&tx, full, &cancel).await {
                    return;
                }
                groups += 1;
            }
        }

        if !group.is_empty() && send_group(&tx, group, &cancel).await {
            groups += 1;
        }
        debug!(groups = groups, "Grouping finished");
    });

    receiver_stream(rx)
}

async fn send_group<T>(
    tx: &mpsc::Sender<Vec<Item<T>>>,
    group: Vec<Item<T>>,
    cancel: &CancelSignal,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(group) => sent.is_ok(),
    }
}
