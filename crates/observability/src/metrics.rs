//! 分发指标收集模块
//!
//! 记录调用、转发批次与 offset 提交的 Prometheus 指标，
//! 并在内存中聚合运行摘要。

use metrics::{counter, gauge, histogram};

/// 记录一次通知批次处理
///
/// 每次调用尝试结束后调用一次。
pub fn record_invocation(notifications: usize, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!("cdc_dispatcher_invocations_total", "status" => status).increment(1);
    counter!("cdc_dispatcher_notifications_total").increment(notifications as u64);
    histogram!("cdc_dispatcher_invocation_latency_ms").record(latency_ms);
}

/// Record change markers written by the classifier
pub fn record_markers_written(count: usize) {
    if count > 0 {
        counter!("cdc_dispatcher_markers_written_total").increment(count as u64);
    }
}

/// 记录转发到 sink 的批次
pub fn record_batch_forwarded(sink_name: &str, events: usize) {
    counter!(
        "cdc_dispatcher_batches_forwarded_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
    counter!(
        "cdc_dispatcher_events_forwarded_total",
        "sink" => sink_name.to_string()
    )
    .increment(events as u64);
    histogram!("cdc_dispatcher_batch_size").record(events as f64);
}

/// 记录单个 stream 的 offset 提交
pub fn record_offset_committed(stream: &str, version: i64) {
    counter!("cdc_dispatcher_offsets_committed_total").increment(1);
    gauge!(
        "cdc_dispatcher_committed_version",
        "stream" => stream.to_string()
    )
    .set(version as f64);
}

/// Record a stream pipeline that failed within an invocation
pub fn record_stream_failure(transient: bool) {
    let kind = if transient { "transient" } else { "fatal" };
    counter!("cdc_dispatcher_stream_failures_total", "kind" => kind).increment(1);
}

/// Record a redelivery of a failed notification batch
pub fn record_redelivery(attempt: u32) {
    counter!("cdc_dispatcher_redeliveries_total").increment(1);
    gauge!("cdc_dispatcher_last_redelivery_attempt").set(attempt as f64);
}

/// 分发指标聚合器
#[derive(Debug, Clone, Default)]
pub struct DispatchMetricsAggregator {
    pub invocations: u64,
    pub failed_invocations: u64,
    pub notifications: u64,
    pub markers_written: u64,
    pub events_forwarded: u64,
    pub latency_ms: RunningStats,
    pub batch_sizes: RunningStats,
}

impl DispatchMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计一次已完成的调用
    pub fn record_invocation(&mut self, notifications: usize, success: bool, latency_ms: f64) {
        self.invocations += 1;
        self.notifications += notifications as u64;
        if !success {
            self.failed_invocations += 1;
        }
        self.latency_ms.push(latency_ms);
    }

    pub fn record_markers(&mut self, count: usize) {
        self.markers_written += count as u64;
    }

    /// Fold in one forwarded batch
    pub fn record_batch(&mut self, events: usize) {
        self.events_forwarded += events as u64;
        self.batch_sizes.push(events as f64);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            invocations: self.invocations,
            failed_invocations: self.failed_invocations,
            notifications: self.notifications,
            markers_written: self.markers_written,
            events_forwarded: self.events_forwarded,
            failure_rate: if self.invocations > 0 {
                self.failed_invocations as f64 / self.invocations as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_ms),
            batch_size: StatsSummary::from(&self.batch_sizes),
        }
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub invocations: u64,
    pub failed_invocations: u64,
    pub notifications: u64,
    pub markers_written: u64,
    pub events_forwarded: u64,
    pub failure_rate: f64,
    pub latency_ms: StatsSummary,
    pub batch_size: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Metrics Summary ===")?;
        writeln!(f, "Invocations: {}", self.invocations)?;
        writeln!(
            f,
            "Failed invocations: {} ({:.2}%)",
            self.failed_invocations, self.failure_rate
        )?;
        writeln!(f, "Notifications: {}", self.notifications)?;
        writeln!(f, "Markers written: {}", self.markers_written)?;
        writeln!(f, "Events forwarded: {}", self.events_forwarded)?;
        writeln!(f, "Invocation latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        Ok(())
    }
}

/// Min / max / mean / std of a series
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线均值/方差 (Welford 算法)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
