//! MessageSink trait - dispatcher output interface

use crate::{ContractError, SinkBatch};

/// Downstream message broker
///
/// `send` takes `&self`: pipelines for different streams forward through the
/// same sink concurrently.
#[trait_variant::make(MessageSink: Send)]
pub trait LocalMessageSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Forward an ordered batch.
    ///
    /// Either every message is accepted in order or an error is returned;
    /// partial acceptance is never reported as success.
    async fn send(&self, batch: &SinkBatch) -> Result<(), ContractError>;

    /// Flush and release the underlying connection
    async fn close(&self) -> Result<(), ContractError>;
}
