//! ChangeFeedRunner - drives a handler from a change feed
//!
//! Stands in for the host trigger: pulls notification batches, invokes the
//! handler once per batch, and redelivers the same batch after transient
//! failures.

use std::time::{Duration, Instant};

use contracts::{ChangeFeed, RunnerConfig, StreamNotification};
use observability::DispatchMetricsAggregator;
use tracing::{error, info, instrument, warn};

use crate::dispatcher::{ChangeHandler, InvocationReport};
use crate::error::DispatchError;

/// Runner settings
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Redeliveries of a batch after its first failed attempt
    pub max_redeliveries: u32,
    pub redelivery_backoff: Duration,
    /// Abort an invocation that has not settled in time
    pub invocation_timeout: Option<Duration>,
    /// Stop once the feed delivered nothing for this long
    pub idle_timeout: Option<Duration>,
    /// Return the first batch that ultimately fails instead of moving on
    pub fail_fast: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

impl From<&RunnerConfig> for RunnerOptions {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            max_redeliveries: config.max_redeliveries,
            redelivery_backoff: Duration::from_millis(config.redelivery_backoff_ms),
            invocation_timeout: (config.invocation_timeout_ms > 0)
                .then(|| Duration::from_millis(config.invocation_timeout_ms)),
            idle_timeout: None,
            fail_fast: false,
        }
    }
}

impl RunnerOptions {
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// What a run did
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Batches taken from the feed
    pub batches: u64,
    pub succeeded: u64,
    /// Batches given up after their last attempt
    pub failed: u64,
    pub redeliveries: u64,
    pub metrics: DispatchMetricsAggregator,
}

/// Drives a [`ChangeHandler`] from a [`ChangeFeed`]
pub struct ChangeFeedRunner<H> {
    handler: H,
    options: RunnerOptions,
}

impl<H> ChangeFeedRunner<H>
where
    H: ChangeHandler + Sync,
{
    pub fn new(handler: H, options: RunnerOptions) -> Self {
        Self { handler, options }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Consume `feed` until it closes or stays idle past the idle timeout.
    ///
    /// Batches that still fail after every redelivery are logged and
    /// counted; with `fail_fast` the first one ends the run with its error.
    #[instrument(name = "runner_run", skip(self, feed))]
    pub async fn run<F>(&self, feed: &mut F) -> Result<RunSummary, DispatchError>
    where
        F: ChangeFeed,
    {
        let mut summary = RunSummary::default();
        info!(
            max_redeliveries = self.options.max_redeliveries,
            fail_fast = self.options.fail_fast,
            "Runner started"
        );

        while let Some(batch) = self.next_batch(feed).await {
            summary.batches += 1;
            match self.deliver(&batch, &mut summary).await {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(notifications = batch.len(), error = %e, "Batch failed permanently");
                    if self.options.fail_fast {
                        return Err(e);
                    }
                }
            }
        }

        info!(
            batches = summary.batches,
            failed = summary.failed,
            redeliveries = summary.redeliveries,
            "Runner stopped"
        );
        Ok(summary)
    }

    async fn next_batch<F: ChangeFeed>(&self, feed: &mut F) -> Option<Vec<StreamNotification>> {
        match self.options.idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, feed.next_batch()).await {
                Ok(batch) => batch,
                Err(_) => {
                    info!(idle_ms = idle.as_millis() as u64, "Change feed idle");
                    None
                }
            },
            None => feed.next_batch().await,
        }
    }

    /// Invoke the handler, redelivering the batch after transient failures
    async fn deliver(
        &self,
        batch: &[StreamNotification],
        summary: &mut RunSummary,
    ) -> Result<InvocationReport, DispatchError> {
        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            let result = self.invoke(batch).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            observability::record_invocation(batch.len(), result.is_ok(), latency_ms);
            summary
                .metrics
                .record_invocation(batch.len(), result.is_ok(), latency_ms);

            match result {
                Ok(report) => {
                    summary.metrics.record_markers(report.markers_written);
                    for stream in &report.dispatch.streams {
                        for size in &stream.batch_sizes {
                            summary.metrics.record_batch(*size);
                        }
                    }
                    return Ok(report);
                }
                Err(e) if e.is_transient() && attempt < self.options.max_redeliveries => {
                    attempt += 1;
                    summary.redeliveries += 1;
                    observability::record_redelivery(attempt);
                    warn!(attempt, error = %e, "Invocation failed, redelivering batch");
                    tokio::time::sleep(self.options.redelivery_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn invoke(&self, batch: &[StreamNotification]) -> Result<InvocationReport, DispatchError> {
        match self.options.invocation_timeout {
            Some(limit) => tokio::time::timeout(limit, self.handler.handle(batch))
                .await
                .map_err(|_| DispatchError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => self.handler.handle(batch).await,
        }
    }
}
