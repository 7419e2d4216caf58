//! Fan-in of worker outputs into one channel

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::FetchPhase;
use crate::CancelSignal;

/// Merges several bounded channels into one
///
/// There is no ordering across inputs; the order within one input is kept.
#[derive(Debug, Clone)]
pub struct StreamMerger {
    buffer_size: usize,
    cancel: CancelSignal,
}

impl StreamMerger {
    /// Create a merger whose output holds up to `buffer_size` items
    pub fn new(buffer_size: usize, cancel: CancelSignal) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            cancel,
        }
    }

    /// Start one pump task per input and return the merged output
    ///
    /// The output closes once every pump has finished: an input ended, the
    /// call was cancelled, or the consumer dropped the output.
    pub fn merge<T: Send + 'static>(&self, inputs: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let input_count = inputs.len();

        let pumps: Vec<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(idx, mut input)| {
                let tx = tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    let mut forwarded = 0usize;
                    loop {
                        let item = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            item = input.recv() => match item {
                                Some(item) => item,
                                None => break,
                            },
                        };
                        let sent = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            sent = tx.send(item) => sent,
                        };
                        if sent.is_err() {
                            break;
                        }
                        forwarded += 1;
                    }
                    trace!(input = idx, forwarded = forwarded, "Merge pump finished");
                })
            })
            .collect();

        // The output channel closes when the last pump drops its sender.
        drop(tx);

        tokio::spawn(async move {
            join_all(pumps).await;
            debug!(phase = %FetchPhase::Closed, inputs = input_count, "Merged stream closed");
        });

        rx
    }
}
