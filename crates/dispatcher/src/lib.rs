//! # Dispatcher
//!
//! Change-data-capture dispatch.
//!
//! 负责：
//! - Classify change-feed notifications into marker writes and dispatches
//! - Catch up each changed stream from its offset, concurrently across streams
//! - Forward each page to the sink, then advance the stream's offset
//! - Drive invocations from a change feed with redelivery

pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod sinks;

pub use classifier::{classify, Classification};
pub use dispatcher::{
    ChangeHandler, DispatchReport, Dispatcher, DispatcherConfig, InvocationReport, StreamReport,
};
pub use error::{DispatchError, StreamFailure};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use runner::{ChangeFeedRunner, RunSummary, RunnerOptions};
pub use sinks::{create_sink, ConfiguredSink, FileSink, FileSinkConfig, LogSink, MemorySink};
