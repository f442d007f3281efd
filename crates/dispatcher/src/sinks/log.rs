//! LogSink - logs batch summaries via tracing

use contracts::{header, ContractError, MessageSink, SinkBatch};
use tracing::{debug, info, instrument};

/// Sink that logs batch summaries instead of talking to a broker
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, batch: &SinkBatch) {
        let version_of = |index: usize| {
            batch
                .messages
                .get(index)
                .and_then(|m| m.headers.get(header::VERSION))
                .map(String::as_str)
                .unwrap_or("-")
        };

        info!(
            sink = %self.name,
            topic = %batch.topic,
            messages = batch.len(),
            key = batch.messages.first().map(|m| m.key.as_str()).unwrap_or("-"),
            first_version = version_of(0),
            last_version = version_of(batch.len().saturating_sub(1)),
            "Batch forwarded"
        );
    }
}

impl MessageSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_send",
        skip(self, batch),
        fields(sink = %self.name, messages = batch.len())
    )]
    async fn send(&self, batch: &SinkBatch) -> Result<(), ContractError> {
        self.log_batch_summary(batch);
        for message in &batch.messages {
            debug!(key = %message.key, headers = ?message.headers, bytes = message.value.len(), "Message");
        }
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
