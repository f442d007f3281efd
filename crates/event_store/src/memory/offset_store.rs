//! MemoryOffsetStore - in-process offset table

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{ContractError, Offset, OffsetStore, StreamKey};
use tokio::sync::Mutex;
use tracing::instrument;

use super::stats::{OffsetStats, OffsetStatsSnapshot};

struct Inner {
    name: String,
    offsets: Mutex<HashMap<StreamKey, i64>>,
    stats: OffsetStats,
}

/// Shared handle to an in-memory offset table
#[derive(Clone)]
pub struct MemoryOffsetStore {
    inner: Arc<Inner>,
}

impl MemoryOffsetStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                offsets: Mutex::new(HashMap::new()),
                stats: OffsetStats::default(),
            }),
        }
    }

    /// Stored version for `id`, bypassing request accounting
    pub async fn peek(&self, id: &str) -> Option<i64> {
        self.inner.offsets.lock().await.get(id).copied()
    }

    /// Seed an offset without counting a request
    pub async fn seed(&self, offset: Offset) {
        self.inner
            .offsets
            .lock()
            .await
            .insert(offset.id, offset.version);
    }

    pub fn stats(&self) -> OffsetStatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn name(&self) -> &str {
        &self.inner.name
    }

    #[instrument(
        name = "memory_offset_store_batch_get",
        skip(self, ids),
        fields(store = %self.inner.name, count = ids.len())
    )]
    async fn batch_get(&self, ids: &[StreamKey]) -> Result<Vec<Offset>, ContractError> {
        self.inner.stats.inc_batch_gets();
        let offsets = self.inner.offsets.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| offsets.get(id).map(|version| Offset::new(id.clone(), *version)))
            .collect())
    }

    #[instrument(
        name = "memory_offset_store_put",
        skip(self, offset),
        fields(store = %self.inner.name, stream = %offset.id, version = offset.version)
    )]
    async fn put(&self, offset: &Offset) -> Result<(), ContractError> {
        self.inner.stats.inc_puts();
        self.inner
            .offsets
            .lock()
            .await
            .insert(offset.id.clone(), offset.version);
        Ok(())
    }

    #[instrument(
        name = "memory_offset_store_put_if",
        skip(self, offset),
        fields(store = %self.inner.name, stream = %offset.id, version = offset.version)
    )]
    async fn put_if(&self, offset: &Offset, expected: i64) -> Result<(), ContractError> {
        self.inner.stats.inc_puts();
        let mut offsets = self.inner.offsets.lock().await;
        let actual = offsets.get(&offset.id).copied().unwrap_or(0);
        if actual != expected {
            self.inner.stats.inc_conflicts();
            return Err(ContractError::OffsetConflict {
                id: offset.id.to_string(),
                expected,
                actual,
            });
        }
        offsets.insert(offset.id.clone(), offset.version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_batch_get() {
        let store = MemoryOffsetStore::new("offsets");
        store.put(&Offset::new("s:1", 4)).await.unwrap();

        let ids = [StreamKey::from("s:1"), StreamKey::from("s:2")];
        let offsets = store.batch_get(&ids).await.unwrap();
        assert_eq!(offsets, vec![Offset::new("s:1", 4)]);
    }

    #[tokio::test]
    async fn test_put_is_unconditional() {
        let store = MemoryOffsetStore::new("offsets");
        store.put(&Offset::new("s:1", 9)).await.unwrap();
        store.put(&Offset::new("s:1", 2)).await.unwrap();
        assert_eq!(store.peek("s:1").await, Some(2));
    }

    #[tokio::test]
    async fn test_put_if_checks_expected_version() {
        let store = MemoryOffsetStore::new("offsets");
        // Absent offsets compare as 0
        store.put_if(&Offset::new("s:1", 3), 0).await.unwrap();

        let err = store.put_if(&Offset::new("s:1", 5), 0).await.unwrap_err();
        assert!(matches!(
            err,
            ContractError::OffsetConflict {
                expected: 0,
                actual: 3,
                ..
            }
        ));
        assert_eq!(store.peek("s:1").await, Some(3));

        store.put_if(&Offset::new("s:1", 5), 3).await.unwrap();
        assert_eq!(store.peek("s:1").await, Some(5));
        assert_eq!(store.stats().conflicts, 1);
    }
}
