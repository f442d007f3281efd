//! ChangeFeed trait - inbound notification batches
//!
//! Abstracts whatever host trigger reports event log writes (push, polling,
//! log tailing). Delivery is at-least-once and batches are arbitrary.

use crate::StreamNotification;

#[trait_variant::make(ChangeFeed: Send)]
pub trait LocalChangeFeed {
    /// Wait for the next non-empty batch; `None` once the feed is closed.
    async fn next_batch(&mut self) -> Option<Vec<StreamNotification>>;
}
