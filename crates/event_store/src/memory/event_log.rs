//! MemoryEventLog - in-process event log with a change feed
//!
//! Mirrors the behavior of a partition/sort keyed table: range queries are
//! limited to `page_size` evaluated rows and hand back the last evaluated key
//! whenever that limit is reached, even if nothing follows it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use contracts::{
    ContractError, Event, EventLog, EventPage, PageCursor, StreamKey, StreamNotification,
    CHANGE_MARKER_VERSION,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, instrument};

use super::feed::MemoryChangeFeed;
use super::stats::{LogStats, LogStatsSnapshot};

/// Row stored under `(id, version)`
#[derive(Debug, Clone)]
enum LogRow {
    Event(Event),
    Marker,
}

struct Inner {
    name: String,
    page_size: usize,
    rows: Mutex<BTreeMap<StreamKey, BTreeMap<i64, LogRow>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<StreamNotification>>>,
    stats: LogStats,
}

/// Shared handle to an in-memory event log
#[derive(Clone)]
pub struct MemoryEventLog {
    inner: Arc<Inner>,
}

impl MemoryEventLog {
    /// Create an empty log returning at most `page_size` rows per query
    pub fn new(name: impl Into<String>, page_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                page_size: page_size.max(1),
                rows: Mutex::new(BTreeMap::new()),
                subscribers: Mutex::new(Vec::new()),
                stats: LogStats::default(),
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Open a change feed receiving one notification per row written from now on
    pub async fn subscribe(&self, max_batch_size: usize) -> MemoryChangeFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().await.push(tx);
        MemoryChangeFeed::new(rx, max_batch_size)
    }

    /// Request counters
    pub fn stats(&self) -> LogStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Versions of the events stored for `id`, ascending
    pub async fn event_versions(&self, id: &str) -> Vec<i64> {
        let rows = self.inner.rows.lock().await;
        rows.get(id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|(_, row)| matches!(row, LogRow::Event(_)))
                    .map(|(version, _)| *version)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of change marker rows stored for `id` (0 or 1)
    pub async fn marker_count(&self, id: &str) -> usize {
        let rows = self.inner.rows.lock().await;
        rows.get(id)
            .map(|stream| {
                stream
                    .values()
                    .filter(|row| matches!(row, LogRow::Marker))
                    .count()
            })
            .unwrap_or(0)
    }

    async fn publish(&self, notifications: Vec<StreamNotification>) {
        let mut subscribers = self.inner.subscribers.lock().await;
        subscribers.retain(|tx| {
            notifications
                .iter()
                .all(|notification| tx.send(notification.clone()).is_ok())
        });
    }
}

impl EventLog for MemoryEventLog {
    fn name(&self) -> &str {
        &self.inner.name
    }

    #[instrument(
        name = "memory_event_log_query_page",
        skip(self, id, cursor),
        fields(store = %self.inner.name, stream = %id)
    )]
    async fn query_page(
        &self,
        id: &StreamKey,
        after_version: i64,
        cursor: Option<&PageCursor>,
    ) -> Result<EventPage, ContractError> {
        self.inner.stats.inc_queries();

        let start = match cursor {
            Some(cursor) if cursor.id != *id => {
                return Err(ContractError::store(
                    &self.inner.name,
                    "query",
                    format!("cursor for '{}' used to query '{}'", cursor.id, id),
                ));
            }
            Some(cursor) => cursor.version.max(after_version),
            None => after_version,
        };

        let rows = self.inner.rows.lock().await;
        let Some(stream) = rows.get(id.as_str()) else {
            return Ok(EventPage::default());
        };

        let mut events = Vec::new();
        let mut evaluated = 0;
        let mut last_key = None;
        for (version, row) in stream.range(start.saturating_add(1)..) {
            evaluated += 1;
            last_key = Some(*version);
            if let LogRow::Event(event) = row {
                events.push(event.clone());
            }
            if evaluated == self.inner.page_size {
                break;
            }
        }

        let next_cursor = if evaluated == self.inner.page_size {
            last_key.map(|version| PageCursor {
                id: id.clone(),
                version,
            })
        } else {
            None
        };

        debug!(events = events.len(), more = next_cursor.is_some(), "Page read");
        Ok(EventPage {
            events,
            next_cursor,
        })
    }

    #[instrument(
        name = "memory_event_log_put_markers",
        skip(self, ids),
        fields(store = %self.inner.name, count = ids.len())
    )]
    async fn put_markers(&self, ids: &[StreamKey]) -> Result<(), ContractError> {
        self.inner.stats.inc_marker_requests();

        {
            let mut rows = self.inner.rows.lock().await;
            for id in ids {
                rows.entry(id.clone())
                    .or_default()
                    .insert(CHANGE_MARKER_VERSION, LogRow::Marker);
            }
        }

        self.publish(ids.iter().cloned().map(StreamNotification::marker).collect())
            .await;
        Ok(())
    }

    #[instrument(
        name = "memory_event_log_append",
        skip(self, events),
        fields(store = %self.inner.name, count = events.len())
    )]
    async fn append(&self, events: &[Event]) -> Result<(), ContractError> {
        self.inner.stats.inc_appends();
        for event in events {
            event.validate()?;
        }

        {
            let mut rows = self.inner.rows.lock().await;
            // Reject the whole request before touching any row. Each event must
            // follow the stream's head, including earlier events of this request.
            let mut heads: HashMap<&StreamKey, i64> = HashMap::new();
            for event in events {
                let head = match heads.get(&event.id) {
                    Some(head) => *head,
                    None => rows
                        .get(event.id.as_str())
                        .and_then(|stream| stream.keys().next_back().copied())
                        .unwrap_or(0)
                        .max(0),
                };
                if event.version <= head {
                    return Err(ContractError::InvalidVersion {
                        id: event.id.to_string(),
                        version: event.version,
                        message: format!("stream is already at version {head}"),
                    });
                }
                heads.insert(&event.id, event.version);
            }
            for event in events {
                rows.entry(event.id.clone())
                    .or_default()
                    .insert(event.version, LogRow::Event(event.clone()));
            }
        }

        self.publish(events.iter().map(Event::notification).collect())
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::synthetic_events;
    use contracts::ChangeFeed;

    #[tokio::test]
    async fn test_query_pages_by_evaluated_rows() {
        let log = MemoryEventLog::new("events", 2);
        log.append(&synthetic_events("order", "1", 1..=3)).await.unwrap();
        let id = StreamKey::compose("order", "1");

        let first = log.query_page(&id, 0, None).await.unwrap();
        let versions: Vec<i64> = first.events.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![1, 2]);
        let cursor = first.next_cursor.expect("full page returns a cursor");

        let second = log.query_page(&id, 0, Some(&cursor)).await.unwrap();
        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].version, 3);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_with_empty_page() {
        let log = MemoryEventLog::new("events", 2);
        log.append(&synthetic_events("order", "1", 1..=2)).await.unwrap();
        let id = StreamKey::compose("order", "1");

        let first = log.query_page(&id, 0, None).await.unwrap();
        let cursor = first.next_cursor.unwrap();
        let second = log.query_page(&id, 0, Some(&cursor)).await.unwrap();
        assert!(second.events.is_empty());
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_markers_are_idempotent_and_hidden_from_queries() {
        let log = MemoryEventLog::new("events", 10);
        log.append(&synthetic_events("order", "1", 1..=2)).await.unwrap();
        let id = StreamKey::compose("order", "1");

        log.put_markers(&[id.clone()]).await.unwrap();
        log.put_markers(&[id.clone()]).await.unwrap();

        assert_eq!(log.marker_count(&id).await, 1);
        assert_eq!(log.event_versions(&id).await, vec![1, 2]);
        let page = log.query_page(&id, 0, None).await.unwrap();
        assert_eq!(page.events.len(), 2);
    }

    #[tokio::test]
    async fn test_append_rejects_invalid_and_duplicate_versions() {
        let log = MemoryEventLog::new("events", 10);
        let mut bad = synthetic_events("order", "1", 1..=1);
        bad[0].version = 0;
        assert!(matches!(
            log.append(&bad).await,
            Err(ContractError::InvalidVersion { .. })
        ));

        log.append(&synthetic_events("order", "1", 1..=2)).await.unwrap();
        let result = log.append(&synthetic_events("order", "1", 2..=3)).await;
        assert!(matches!(result, Err(ContractError::InvalidVersion { version: 2, .. })));
        // Nothing from the rejected request was stored
        assert_eq!(log.event_versions("order:1").await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_append_rejects_repeated_version_within_request() {
        let log = MemoryEventLog::new("events", 10);
        let mut feed = log.subscribe(100).await;
        let mut events = synthetic_events("order", "1", 1..=1);
        let mut rewrite = events[0].clone();
        rewrite.event_id = "rewrite".to_string();
        events.push(rewrite);

        let result = log.append(&events).await;
        assert!(matches!(result, Err(ContractError::InvalidVersion { version: 1, .. })));
        assert!(log.event_versions("order:1").await.is_empty());

        // A rejected request publishes nothing
        log.put_markers(&[StreamKey::from("order:1")]).await.unwrap();
        let batch = feed.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].version, CHANGE_MARKER_VERSION);
    }

    #[tokio::test]
    async fn test_append_rejects_versions_behind_the_head() {
        let log = MemoryEventLog::new("events", 10);
        let mut events = synthetic_events("order", "1", 1..=1);
        events.extend(synthetic_events("order", "1", 5..=5));
        log.append(&events).await.unwrap();

        let late = synthetic_events("order", "1", 3..=3);
        assert!(matches!(
            log.append(&late).await,
            Err(ContractError::InvalidVersion { version: 3, .. })
        ));

        // Out of order within one request
        let mut unordered = synthetic_events("order", "1", 7..=7);
        unordered.extend(synthetic_events("order", "1", 6..=6));
        assert!(log.append(&unordered).await.is_err());

        // Markers do not count as the head
        log.put_markers(&[StreamKey::from("order:1")]).await.unwrap();
        log.append(&synthetic_events("order", "1", 6..=6)).await.unwrap();
        assert_eq!(log.event_versions("order:1").await, vec![1, 5, 6]);
    }

    #[tokio::test]
    async fn test_change_feed_reports_every_row() {
        let log = MemoryEventLog::new("events", 10);
        let mut feed = log.subscribe(100).await;

        log.append(&synthetic_events("order", "1", 1..=3)).await.unwrap();
        log.put_markers(&[StreamKey::compose("order", "1")]).await.unwrap();

        let batch = feed.next_batch().await.unwrap();
        let versions: Vec<i64> = batch.iter().map(|n| n.version).collect();
        assert_eq!(versions, vec![1, 2, 3, CHANGE_MARKER_VERSION]);
    }

    #[tokio::test]
    async fn test_stats_count_requests() {
        let log = MemoryEventLog::new("events", 10);
        let id = StreamKey::from("none:0");
        log.query_page(&id, 0, None).await.unwrap();
        log.put_markers(&[id]).await.unwrap();
        let stats = log.stats();
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.marker_requests, 1);
        assert_eq!(stats.appends, 0);
    }
}
