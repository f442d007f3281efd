//! Dispatcher - catch-up fan-out from the event log to the sink

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use contracts::{
    CommitMode, ContractError, Event, EventLog, MessageSink, Offset, OffsetStore, SinkBatch,
    StreamKey, StreamNotification,
};
use event_store::EventStore;
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use crate::classifier::classify;
use crate::error::{DispatchError, StreamFailure};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Topic every forwarded batch is addressed to
    pub topic: String,
    pub commit_mode: CommitMode,
}

impl DispatcherConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            commit_mode: CommitMode::default(),
        }
    }

    pub fn with_commit_mode(mut self, commit_mode: CommitMode) -> Self {
        self.commit_mode = commit_mode;
        self
    }
}

/// Outcome of one stream's catch-up pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub id: StreamKey,
    /// Non-empty pages forwarded
    pub pages: usize,
    pub events: usize,
    /// Messages in each batch handed to the sink, in send order
    pub batch_sizes: Vec<usize>,
    /// Offset written by this pipeline; `None` if nothing was forwarded
    pub committed: Option<i64>,
}

/// Outcome of a successful `dispatch`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub streams: Vec<StreamReport>,
}

impl DispatchReport {
    pub fn events_forwarded(&self) -> usize {
        self.streams.iter().map(|s| s.events).sum()
    }

    pub fn stream(&self, id: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.id == id)
    }
}

/// Outcome of handling one notification batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationReport {
    pub notifications: usize,
    pub markers_written: usize,
    pub dispatch: DispatchReport,
}

/// Handles one notification batch per invocation
#[trait_variant::make(ChangeHandler: Send)]
pub trait LocalChangeHandler {
    async fn handle(
        &self,
        batch: &[StreamNotification],
    ) -> Result<InvocationReport, DispatchError>;
}

/// Forwards unforwarded events of changed streams and advances their offsets
///
/// Store and sink handles live for the whole process; every invocation
/// borrows them.
pub struct Dispatcher<L, O, S> {
    store: EventStore<L, O>,
    sink: S,
    config: DispatcherConfig,
    metrics: Arc<DispatchMetrics>,
}

impl<L, O, S> Dispatcher<L, O, S>
where
    L: EventLog + Sync,
    O: OffsetStore + Sync,
    S: MessageSink + Sync,
{
    pub fn new(store: EventStore<L, O>, sink: S, config: DispatcherConfig) -> Self {
        Self {
            store,
            sink,
            config,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn store(&self) -> &EventStore<L, O> {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Classify a batch, mark streams with fresh writes, dispatch marked streams
    #[instrument(
        name = "dispatcher_handle",
        skip(self, batch),
        fields(notifications = batch.len())
    )]
    pub async fn handle_batch(
        &self,
        batch: &[StreamNotification],
    ) -> Result<InvocationReport, DispatchError> {
        let result = self.handle_inner(batch).await;
        self.metrics.record_invocation(result.is_ok());
        result
    }

    async fn handle_inner(
        &self,
        batch: &[StreamNotification],
    ) -> Result<InvocationReport, DispatchError> {
        let classification = classify(batch)?;
        debug!(
            dispatch = classification.keys_to_dispatch.len(),
            record = classification.keys_to_record_changes.len(),
            "Batch classified"
        );

        let markers_written = self
            .store
            .register_changes(&classification.keys_to_record_changes)
            .await?;
        self.metrics.add_markers_written(markers_written);
        observability::record_markers_written(markers_written);

        let dispatch = self.dispatch(&classification.keys_to_dispatch).await?;

        Ok(InvocationReport {
            notifications: batch.len(),
            markers_written,
            dispatch,
        })
    }

    /// Catch up every stream in `ids` concurrently.
    ///
    /// Waits for all pipelines to settle. If any failed, the error carries
    /// every failure; the other streams still forwarded and committed.
    #[instrument(name = "dispatcher_dispatch", skip(self, ids), fields(streams = ids.len()))]
    pub async fn dispatch(&self, ids: &[StreamKey]) -> Result<DispatchReport, DispatchError> {
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<StreamKey> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        if ids.is_empty() {
            return Ok(DispatchReport::default());
        }

        let offsets = self.store.get_offsets(&ids).await?;
        let pipelines = ids.iter().map(|id| {
            let offset = offsets
                .get(id)
                .cloned()
                .unwrap_or_else(|| Offset::initial(id.clone()));
            async move {
                let result = self.dispatch_one(&offset).await;
                (offset.id, result)
            }
        });

        let mut streams = Vec::with_capacity(ids.len());
        let mut failures = Vec::new();
        for (id, result) in join_all(pipelines).await {
            match result {
                Ok(report) => streams.push(report),
                Err(error) => {
                    error!(stream = %id, error = %error, "Stream dispatch failed");
                    self.metrics.inc_stream_failures();
                    observability::record_stream_failure(error.is_transient());
                    failures.push(StreamFailure { id, error });
                }
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::StreamsFailed {
                failures,
                succeeded: streams.len(),
            });
        }

        let report = DispatchReport { streams };
        info!(
            streams = report.streams.len(),
            events = report.events_forwarded(),
            "Dispatch complete"
        );
        Ok(report)
    }

    /// Forward every event of one stream above `offset`, page by page.
    ///
    /// Each page is sent as one batch and its highest version committed
    /// before the next page is read. A failed send or commit stops the
    /// stream; pages already committed stay committed.
    #[instrument(
        name = "dispatcher_dispatch_one",
        skip(self, offset),
        fields(stream = %offset.id, from_version = offset.version)
    )]
    pub async fn dispatch_one(&self, offset: &Offset) -> Result<StreamReport, ContractError> {
        let committed = AtomicI64::new(offset.version);
        let committed_ref = &committed;
        let mut batch_sizes = Vec::new();
        let sizes_ref = &mut batch_sizes;

        let summary = self
            .store
            .read_events_after(offset, move |events| {
                sizes_ref.push(events.len());
                async move { self.forward_page(&offset.id, events, committed_ref).await }
            })
            .await?;

        let last = committed.load(Ordering::Acquire);
        Ok(StreamReport {
            id: offset.id.clone(),
            pages: summary.pages,
            events: summary.events,
            batch_sizes,
            committed: (summary.pages > 0).then_some(last),
        })
    }

    async fn forward_page(
        &self,
        id: &StreamKey,
        events: Vec<Event>,
        committed: &AtomicI64,
    ) -> Result<(), ContractError> {
        let Some(max_version) = events.iter().map(|e| e.version).max() else {
            return Ok(());
        };

        let batch = SinkBatch::from_events(&self.config.topic, &events);
        self.sink.send(&batch).await?;
        self.metrics.record_batch(batch.len());
        observability::record_batch_forwarded(self.sink.name(), batch.len());

        let next = Offset::new(id.clone(), max_version);
        match self.config.commit_mode {
            CommitMode::Unconditional => self.store.commit_offset(&next).await?,
            CommitMode::Conditional => {
                let expected = committed.load(Ordering::Acquire);
                if let Err(e) = self.store.commit_offset_if(&next, expected).await {
                    warn!(stream = %id, expected, error = %e, "Conditional commit rejected");
                    return Err(e);
                }
            }
        }
        committed.store(max_version, Ordering::Release);
        self.metrics.inc_offsets_committed();
        observability::record_offset_committed(id.as_str(), max_version);

        debug!(stream = %id, events = events.len(), version = max_version, "Page forwarded");
        Ok(())
    }
}

impl<L, O, S> ChangeHandler for Dispatcher<L, O, S>
where
    L: EventLog + Sync,
    O: OffsetStore + Sync,
    S: MessageSink + Sync,
{
    async fn handle(
        &self,
        batch: &[StreamNotification],
    ) -> Result<InvocationReport, DispatchError> {
        self.handle_batch(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemorySink;
    use event_store::memory::{synthetic_events, MemoryEventLog, MemoryOffsetStore};

    type TestDispatcher = Dispatcher<MemoryEventLog, MemoryOffsetStore, MemorySink>;

    struct Fixture {
        log: MemoryEventLog,
        offsets: MemoryOffsetStore,
        sink: MemorySink,
        dispatcher: TestDispatcher,
    }

    fn fixture(page_size: usize, commit_mode: CommitMode) -> Fixture {
        let log = MemoryEventLog::new("events", page_size);
        let offsets = MemoryOffsetStore::new("offsets");
        let sink = MemorySink::new("out");
        let dispatcher = Dispatcher::new(
            EventStore::new(log.clone(), offsets.clone()),
            sink.clone(),
            DispatcherConfig::new("events-out").with_commit_mode(commit_mode),
        );
        Fixture {
            log,
            offsets,
            sink,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_dispatch_empty_is_noop() {
        let f = fixture(10, CommitMode::Unconditional);
        let report = f.dispatcher.dispatch(&[]).await.unwrap();
        assert!(report.streams.is_empty());
        assert_eq!(f.offsets.stats().batch_gets, 0);
        assert_eq!(f.log.stats().queries, 0);
    }

    #[tokio::test]
    async fn test_dispatch_forwards_all_events_in_order() {
        let f = fixture(100, CommitMode::Unconditional);
        f.log.append(&synthetic_events("order", "a", 1..=5)).await.unwrap();

        let report = f.dispatcher.dispatch(&[StreamKey::from("order:a")]).await.unwrap();

        assert_eq!(f.sink.versions_for("a").await, vec![1, 2, 3, 4, 5]);
        assert_eq!(f.offsets.peek("order:a").await, Some(5));
        let stream = report.stream("order:a").unwrap();
        assert_eq!(stream.committed, Some(5));
        assert_eq!(stream.pages, 1);
        assert!(f.sink.batches().await.iter().all(|b| b.topic == "events-out"));
    }

    #[tokio::test]
    async fn test_dispatch_resumes_after_offset_page_by_page() {
        let f = fixture(2, CommitMode::Unconditional);
        f.log.append(&synthetic_events("order", "b", 1..=7)).await.unwrap();
        f.offsets.seed(Offset::new("order:b", 3)).await;

        let report = f.dispatcher.dispatch(&[StreamKey::from("order:b")]).await.unwrap();

        assert_eq!(f.sink.versions_for("b").await, vec![4, 5, 6, 7]);
        assert_eq!(f.sink.batches().await.len(), 2);
        assert_eq!(report.stream("order:b").unwrap().batch_sizes, vec![2, 2]);
        assert_eq!(f.offsets.peek("order:b").await, Some(7));
        // One commit per page
        assert_eq!(f.offsets.stats().puts, 2);
    }

    #[tokio::test]
    async fn test_dispatch_without_new_events_commits_nothing() {
        let f = fixture(10, CommitMode::Unconditional);
        f.offsets.seed(Offset::new("order:c", 2)).await;
        f.log.append(&synthetic_events("order", "c", 1..=2)).await.unwrap();

        let report = f.dispatcher.dispatch(&[StreamKey::from("order:c")]).await.unwrap();

        assert!(f.sink.batches().await.is_empty());
        assert_eq!(report.streams[0].committed, None);
        assert_eq!(f.offsets.stats().puts, 0);
        assert_eq!(f.offsets.peek("order:c").await, Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_dispatched_once() {
        let f = fixture(10, CommitMode::Unconditional);
        f.log.append(&synthetic_events("order", "a", 1..=2)).await.unwrap();

        let ids = [StreamKey::from("order:a"), StreamKey::from("order:a")];
        let report = f.dispatcher.dispatch(&ids).await.unwrap();

        assert_eq!(report.streams.len(), 1);
        assert_eq!(f.sink.versions_for("a").await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_partial_failure_still_commits_other_streams() {
        let f = fixture(10, CommitMode::Unconditional);
        f.log.append(&synthetic_events("order", "x", 1..=3)).await.unwrap();
        f.log.append(&synthetic_events("order", "y", 1..=2)).await.unwrap();
        f.sink.fail_key("x").await;

        let ids = [StreamKey::from("order:x"), StreamKey::from("order:y")];
        let err = f.dispatcher.dispatch(&ids).await.unwrap_err();

        assert_eq!(err.failed_ids(), vec!["order:x"]);
        assert!(matches!(err, DispatchError::StreamsFailed { succeeded: 1, .. }));
        assert!(err.is_transient());
        assert_eq!(f.offsets.peek("order:x").await, None);
        assert_eq!(f.offsets.peek("order:y").await, Some(2));
        assert_eq!(f.dispatcher.metrics().stream_failures, 1);
    }

    #[tokio::test]
    async fn test_send_failure_stops_stream_after_committed_pages() {
        let f = fixture(2, CommitMode::Unconditional);
        f.log.append(&synthetic_events("order", "z", 1..=6)).await.unwrap();
        f.sink.reject_after(1);

        let err = f
            .dispatcher
            .dispatch_one(&Offset::initial("order:z"))
            .await
            .unwrap_err();

        assert!(matches!(err, ContractError::SinkWrite { .. }));
        assert_eq!(f.sink.versions_for("z").await, vec![1, 2]);
        assert_eq!(f.offsets.peek("order:z").await, Some(2));
        // No page is read past the failed one
        assert_eq!(f.log.stats().queries, 2);
    }

    #[tokio::test]
    async fn test_conditional_commit_detects_stale_offset() {
        let f = fixture(10, CommitMode::Conditional);
        f.log.append(&synthetic_events("order", "a", 1..=4)).await.unwrap();

        // Another dispatcher advanced the stream after our offset read
        let stale = Offset::new("order:a", 1);
        f.offsets.seed(Offset::new("order:a", 3)).await;

        let err = f.dispatcher.dispatch_one(&stale).await.unwrap_err();
        assert!(matches!(
            err,
            ContractError::OffsetConflict {
                expected: 1,
                actual: 3,
                ..
            }
        ));
        assert_eq!(f.offsets.peek("order:a").await, Some(3));
    }

    #[tokio::test]
    async fn test_conditional_commit_advances_across_pages() {
        let f = fixture(2, CommitMode::Conditional);
        f.log.append(&synthetic_events("order", "a", 1..=5)).await.unwrap();

        let report = f.dispatcher.dispatch(&[StreamKey::from("order:a")]).await.unwrap();
        assert_eq!(report.streams[0].committed, Some(5));
        assert_eq!(f.offsets.peek("order:a").await, Some(5));
        assert_eq!(f.offsets.stats().conflicts, 0);
    }

    #[tokio::test]
    async fn test_handle_marks_writes_and_dispatches_markers() {
        let f = fixture(10, CommitMode::Unconditional);
        f.log.append(&synthetic_events("order", "a", 1..=2)).await.unwrap();
        f.log.append(&synthetic_events("order", "b", 1..=1)).await.unwrap();

        let batch = vec![
            StreamNotification::new("order:a", 1),
            StreamNotification::new("order:a", 2),
            StreamNotification::marker("order:b"),
            StreamNotification::new("order:b", 1),
        ];
        let report = f.dispatcher.handle_batch(&batch).await.unwrap();

        assert_eq!(report.notifications, 4);
        assert_eq!(report.markers_written, 1);
        assert_eq!(f.log.marker_count("order:a").await, 1);
        assert_eq!(f.log.marker_count("order:b").await, 0);
        assert_eq!(report.dispatch.stream("order:b").unwrap().committed, Some(1));
        assert!(f.sink.messages_for("a").await.is_empty());
        assert_eq!(f.dispatcher.metrics().invocations, 1);
    }

    #[tokio::test]
    async fn test_handle_rejects_malformed_batch_without_writes() {
        let f = fixture(10, CommitMode::Unconditional);
        let batch = vec![
            StreamNotification::new("order:a", 1),
            StreamNotification::new("order:a", 0),
        ];
        let err = f.dispatcher.handle_batch(&batch).await.unwrap_err();

        assert!(!err.is_transient());
        assert_eq!(f.log.stats().marker_requests, 0);
        assert_eq!(f.dispatcher.metrics().failed_invocations, 1);
    }
}
