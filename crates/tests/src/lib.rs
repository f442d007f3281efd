//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 跨 crate 的端到端场景（内存 event log 的 change feed 驱动 runner）
//! - 配置驱动的文件 sink 运行

#[cfg(test)]
mod contract_tests {
    use contracts::{StreamNotification, CHANGE_MARKER_VERSION};

    #[test]
    fn test_marker_sentinel_is_outside_event_domain() {
        assert!(CHANGE_MARKER_VERSION < contracts::FIRST_EVENT_VERSION);
        assert!(StreamNotification::marker("order:a").kind().is_ok());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use contracts::{CommitMode, EventLog, Offset, StreamKey};
    use dispatcher::{ChangeFeedRunner, Dispatcher, DispatcherConfig, MemorySink, RunnerOptions};
    use event_store::memory::{synthetic_events, MemoryChangeFeed, MemoryEventLog, MemoryOffsetStore};
    use event_store::EventStore;

    type MemoryDispatcher = Dispatcher<MemoryEventLog, MemoryOffsetStore, MemorySink>;

    struct Harness {
        log: MemoryEventLog,
        offsets: MemoryOffsetStore,
        sink: MemorySink,
        feed: MemoryChangeFeed,
        runner: ChangeFeedRunner<MemoryDispatcher>,
    }

    async fn harness(page_size: usize, max_redeliveries: u32) -> Harness {
        let log = MemoryEventLog::new("events", page_size);
        let offsets = MemoryOffsetStore::new("offsets");
        let sink = MemorySink::new("broker");
        let feed = log.subscribe(100).await;

        let dispatcher = Dispatcher::new(
            EventStore::new(log.clone(), offsets.clone()),
            sink.clone(),
            DispatcherConfig::new("events-out").with_commit_mode(CommitMode::Conditional),
        );
        let options = RunnerOptions {
            max_redeliveries,
            redelivery_backoff: Duration::from_millis(1),
            invocation_timeout: None,
            idle_timeout: Some(Duration::from_millis(100)),
            fail_fast: false,
        };

        Harness {
            log,
            offsets,
            sink,
            feed,
            runner: ChangeFeedRunner::new(dispatcher, options),
        }
    }

    /// Appended events are marked, then forwarded once the marker arrives
    #[tokio::test]
    async fn test_e2e_new_stream_through_change_feed() {
        let mut h = harness(100, 0).await;
        h.log.append(&synthetic_events("order", "a", 1..=5)).await.unwrap();

        let summary = h.runner.run(&mut h.feed).await.unwrap();

        assert_eq!(h.sink.versions_for("a").await, vec![1, 2, 3, 4, 5]);
        assert_eq!(h.offsets.peek("order:a").await, Some(5));
        assert_eq!(h.log.marker_count("order:a").await, 1);
        // 一批写入通知，一批 marker 通知
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.metrics.summary().events_forwarded, 5);
    }

    /// A stream with a stored offset only forwards what lies beyond it
    #[tokio::test]
    async fn test_e2e_partial_catch_up() {
        let mut h = harness(2, 0).await;
        h.offsets.seed(Offset::new("order:b", 3)).await;
        h.log.append(&synthetic_events("order", "b", 1..=7)).await.unwrap();

        h.runner.run(&mut h.feed).await.unwrap();

        assert_eq!(h.sink.versions_for("b").await, vec![4, 5, 6, 7]);
        assert_eq!(h.sink.batches().await.len(), 2);
        assert_eq!(h.offsets.peek("order:b").await, Some(7));
    }

    /// Dispatching a stream without events touches neither sink nor offset
    #[tokio::test]
    async fn test_e2e_stream_without_events() {
        let h = harness(10, 0).await;
        let report = h
            .runner
            .handler()
            .dispatch(&[StreamKey::from("order:c")])
            .await
            .unwrap();

        assert_eq!(report.streams[0].events, 0);
        assert!(h.sink.batches().await.is_empty());
        assert_eq!(h.offsets.peek("order:c").await, None);
        assert_eq!(h.offsets.stats().puts, 0);
    }

    /// A failing stream is redelivered and given up; its neighbour commits
    #[tokio::test]
    async fn test_e2e_partial_failure_then_recovery() {
        let mut h = harness(10, 1).await;
        h.sink.fail_key("x").await;
        let mut events = synthetic_events("order", "x", 1..=3);
        events.extend(synthetic_events("order", "y", 1..=2));
        h.log.append(&events).await.unwrap();

        let summary = h.runner.run(&mut h.feed).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.redeliveries, 1);
        assert_eq!(h.offsets.peek("order:x").await, None);
        assert_eq!(h.offsets.peek("order:y").await, Some(2));
        assert_eq!(h.sink.versions_for("y").await, vec![1, 2]);

        // 该 stream 的下一次写入会重试所有未转发的事件
        h.sink.heal_key("x").await;
        h.log.append(&synthetic_events("order", "x", 4..=4)).await.unwrap();
        let summary = h.runner.run(&mut h.feed).await.unwrap();

        assert_eq!(summary.failed, 0);
        assert_eq!(h.sink.versions_for("x").await, vec![1, 2, 3, 4]);
        assert_eq!(h.offsets.peek("order:x").await, Some(4));
    }

    /// Redelivered marker writes leave exactly one marker row
    #[tokio::test]
    async fn test_e2e_marker_writes_are_idempotent() {
        let h = harness(10, 0).await;
        h.log.append(&synthetic_events("order", "d", 1..=1)).await.unwrap();
        let batch = vec![contracts::StreamNotification::new("order:d", 1)];

        let dispatcher = h.runner.handler();
        dispatcher.handle_batch(&batch).await.unwrap();
        dispatcher.handle_batch(&batch).await.unwrap();

        assert_eq!(h.log.marker_count("order:d").await, 1);
        assert_eq!(h.log.event_versions("order:d").await, vec![1]);
        assert!(h.sink.batches().await.is_empty());
    }

    /// A later append continues from the committed offset
    #[tokio::test]
    async fn test_e2e_incremental_appends() {
        let mut h = harness(100, 0).await;
        h.log.append(&synthetic_events("order", "e", 1..=2)).await.unwrap();
        h.runner.run(&mut h.feed).await.unwrap();
        h.log.append(&synthetic_events("order", "e", 3..=4)).await.unwrap();
        h.runner.run(&mut h.feed).await.unwrap();

        assert_eq!(h.sink.versions_for("e").await, vec![1, 2, 3, 4]);
        assert_eq!(h.sink.batches().await.len(), 2);
        assert_eq!(h.offsets.peek("order:e").await, Some(4));
        assert_eq!(h.runner.handler().metrics().offsets_committed, 2);
    }
}

#[cfg(test)]
mod config_e2e_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{EventLog, MessageSink};
    use dispatcher::{create_sink, ChangeFeedRunner, Dispatcher, DispatcherConfig, RunnerOptions};
    use event_store::memory::{synthetic_events, MemoryEventLog, MemoryOffsetStore};
    use event_store::EventStore;

    /// Configuration-driven run into a file sink
    #[tokio::test]
    async fn test_e2e_config_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("events.jsonl");
        let content = format!(
            r#"
[event_store]
events_table = "events"
offsets_table = "offsets"
page_size = 2

[sink]
name = "file_out"
sink_type = "file"
topic = "orders-out"

[sink.params]
path = "{}"
"#,
            out.display().to_string().replace('\\', "/")
        );
        let blueprint = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();

        let log = MemoryEventLog::new(
            blueprint.event_store.events_table.clone(),
            blueprint.event_store.page_size,
        );
        let offsets = MemoryOffsetStore::new(blueprint.event_store.offsets_table.clone());
        let mut feed = log.subscribe(blueprint.runner.max_batch_size).await;
        let sink = create_sink(&blueprint.sink).await.unwrap();
        let dispatcher = Dispatcher::new(
            EventStore::new(log.clone(), offsets.clone()),
            sink,
            DispatcherConfig::new(blueprint.sink.topic.clone())
                .with_commit_mode(blueprint.event_store.commit_mode),
        );
        let runner = ChangeFeedRunner::new(
            dispatcher,
            RunnerOptions::from(&blueprint.runner).with_idle_timeout(Duration::from_millis(100)),
        );

        log.append(&synthetic_events("order", "f", 1..=3)).await.unwrap();
        let summary = runner.run(&mut feed).await.unwrap();
        runner.handler().sink().close().await.unwrap();

        assert_eq!(summary.failed, 0);
        assert_eq!(offsets.peek("order:f").await, Some(3));

        let lines: Vec<serde_json::Value> = std::fs::read_to_string(&out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line["topic"] == "orders-out"));
        assert_eq!(lines[2]["headers"]["version"], "3");
    }
}
