//! Sink implementations
//!
//! Contains LogSink, FileSink and MemorySink, plus the configured-sink
//! factory used by the CLI.

mod file;
mod log;
mod memory;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::memory::MemorySink;

use contracts::{ContractError, MessageSink, SinkBatch, SinkConfig, SinkType};
use tracing::instrument;

use crate::error::DispatchError;

/// Sink selected by configuration
pub enum ConfiguredSink {
    Log(LogSink),
    File(FileSink),
    Memory(MemorySink),
}

impl MessageSink for ConfiguredSink {
    fn name(&self) -> &str {
        match self {
            Self::Log(sink) => sink.name(),
            Self::File(sink) => sink.name(),
            Self::Memory(sink) => sink.name(),
        }
    }

    async fn send(&self, batch: &SinkBatch) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.send(batch).await,
            Self::File(sink) => sink.send(batch).await,
            Self::Memory(sink) => sink.send(batch).await,
        }
    }

    async fn close(&self) -> Result<(), ContractError> {
        match self {
            Self::Log(sink) => sink.close().await,
            Self::File(sink) => sink.close().await,
            Self::Memory(sink) => sink.close().await,
        }
    }
}

/// Create the sink described by `config`
#[instrument(
    name = "dispatcher_create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink(config: &SinkConfig) -> Result<ConfiguredSink, DispatchError> {
    match config.sink_type {
        SinkType::Log => Ok(ConfiguredSink::Log(LogSink::new(&config.name))),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatchError::sink_creation(&config.name, e.to_string()))?;
            Ok(ConfiguredSink::File(sink))
        }
        SinkType::Memory => Ok(ConfiguredSink::Memory(MemorySink::new(&config.name))),
    }
}
