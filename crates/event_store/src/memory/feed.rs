//! MemoryChangeFeed - batches notifications published by `MemoryEventLog`

use contracts::{ChangeFeed, StreamNotification};
use tokio::sync::mpsc;

/// Receiving side of a `MemoryEventLog` subscription
pub struct MemoryChangeFeed {
    rx: mpsc::UnboundedReceiver<StreamNotification>,
    max_batch_size: usize,
}

impl MemoryChangeFeed {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<StreamNotification>, max_batch_size: usize) -> Self {
        Self {
            rx,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Notifications buffered but not yet handed out
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl ChangeFeed for MemoryChangeFeed {
    async fn next_batch(&mut self) -> Option<Vec<StreamNotification>> {
        let first = self.rx.recv().await?;
        let mut batch = Vec::with_capacity(self.max_batch_size.min(self.rx.len() + 1));
        batch.push(first);
        while batch.len() < self.max_batch_size {
            match self.rx.try_recv() {
                Ok(notification) => batch.push(notification),
                Err(_) => break,
            }
        }
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batches_respect_max_size() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut feed = MemoryChangeFeed::new(rx, 2);
        for version in 1..=3 {
            tx.send(StreamNotification::new("s:1", version)).unwrap();
        }

        assert_eq!(feed.next_batch().await.unwrap().len(), 2);
        assert_eq!(feed.pending(), 1);
        assert_eq!(feed.next_batch().await.unwrap().len(), 1);

        drop(tx);
        assert!(feed.next_batch().await.is_none());
    }
}
