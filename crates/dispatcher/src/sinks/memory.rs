//! MemorySink - keeps forwarded batches in memory

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{header, ContractError, MessageSink, OutboundMessage, SinkBatch};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

struct Inner {
    name: String,
    batches: Mutex<Vec<SinkBatch>>,
    failing_keys: Mutex<HashSet<String>>,
    fail_next: AtomicUsize,
    /// Batches still accepted before every send fails; `usize::MAX` = unlimited
    accepts_left: AtomicUsize,
}

/// In-memory broker stand-in with failure injection
///
/// Clones share the recorded batches, so a test can keep a handle after
/// handing the sink to a dispatcher.
#[derive(Clone)]
pub struct MemorySink {
    inner: Arc<Inner>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                batches: Mutex::new(Vec::new()),
                failing_keys: Mutex::new(HashSet::new()),
                fail_next: AtomicUsize::new(0),
                accepts_left: AtomicUsize::new(usize::MAX),
            }),
        }
    }

    /// Reject every batch containing a message with `key`
    pub async fn fail_key(&self, key: impl Into<String>) {
        self.inner.failing_keys.lock().await.insert(key.into());
    }

    /// Stop rejecting batches for `key`
    pub async fn heal_key(&self, key: &str) {
        self.inner.failing_keys.lock().await.remove(key);
    }

    /// Reject the next `count` batches regardless of content
    pub fn fail_next(&self, count: usize) {
        self.inner.fail_next.store(count, Ordering::SeqCst);
    }

    /// Accept `count` more batches, then reject every later one
    pub fn reject_after(&self, count: usize) {
        self.inner.accepts_left.store(count, Ordering::SeqCst);
    }

    /// Accepted batches in arrival order
    pub async fn batches(&self) -> Vec<SinkBatch> {
        self.inner.batches.lock().await.clone()
    }

    /// Accepted messages with partition key `key`, in arrival order
    pub async fn messages_for(&self, key: &str) -> Vec<OutboundMessage> {
        self.inner
            .batches
            .lock()
            .await
            .iter()
            .flat_map(|batch| batch.messages.iter())
            .filter(|message| message.key == key)
            .cloned()
            .collect()
    }

    /// Versions of the accepted messages with partition key `key`
    pub async fn versions_for(&self, key: &str) -> Vec<i64> {
        self.messages_for(key)
            .await
            .iter()
            .filter_map(|message| message.headers.get(header::VERSION)?.parse().ok())
            .collect()
    }

    fn take_injected_failure(&self) -> bool {
        let failed_next = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed_next {
            return true;
        }
        self.inner
            .accepts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                usize::MAX => Some(n),
                0 => None,
                n => Some(n - 1),
            })
            .is_err()
    }
}

impl MessageSink for MemorySink {
    fn name(&self) -> &str {
        &self.inner.name
    }

    #[instrument(
        name = "memory_sink_send",
        skip(self, batch),
        fields(sink = %self.inner.name, messages = batch.len())
    )]
    async fn send(&self, batch: &SinkBatch) -> Result<(), ContractError> {
        if self.take_injected_failure() {
            warn!(sink = %self.inner.name, "Injected send failure");
            return Err(ContractError::sink_write(&self.inner.name, "injected failure"));
        }
        {
            let failing = self.inner.failing_keys.lock().await;
            if let Some(message) = batch.messages.iter().find(|m| failing.contains(&m.key)) {
                return Err(ContractError::sink_write(
                    &self.inner.name,
                    format!("key '{}' rejected", message.key),
                ));
            }
        }
        self.inner.batches.lock().await.push(batch.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
