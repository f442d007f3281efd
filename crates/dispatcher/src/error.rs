//! Dispatcher error types

use contracts::{ContractError, StreamKey};
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Store, sink or data error outside the per-stream pipelines
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// One or more stream pipelines failed; every pipeline had settled
    #[error("{}", describe_failures(.failures))]
    StreamsFailed {
        failures: Vec<StreamFailure>,
        /// Streams of the same invocation that completed
        succeeded: usize,
    },

    /// The invocation did not settle in time; unfinished offsets stay uncommitted
    #[error("invocation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },
}

/// Failure of a single stream's catch-up pipeline
#[derive(Debug)]
pub struct StreamFailure {
    pub id: StreamKey,
    pub error: ContractError,
}

fn describe_failures(failures: &[StreamFailure]) -> String {
    match failures.first() {
        Some(first) => format!(
            "{} stream(s) failed, first '{}': {}",
            failures.len(),
            first.id,
            first.error
        ),
        None => "stream dispatch failed".to_string(),
    }
}

impl DispatchError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether redelivering the notification batch can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Contract(error) => error.is_transient(),
            Self::StreamsFailed { failures, .. } => {
                failures.iter().all(|failure| failure.error.is_transient())
            }
            Self::Timeout { .. } => true,
            Self::SinkCreation { .. } => false,
        }
    }

    /// Ids of the streams that failed, if this is a fan-out failure
    pub fn failed_ids(&self) -> Vec<&StreamKey> {
        match self {
            Self::StreamsFailed { failures, .. } => failures.iter().map(|f| &f.id).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_failed_display_names_first_failure() {
        let err = DispatchError::StreamsFailed {
            failures: vec![
                StreamFailure {
                    id: StreamKey::from("order:x"),
                    error: ContractError::sink_write("out", "broker down"),
                },
                StreamFailure {
                    id: StreamKey::from("order:y"),
                    error: ContractError::sink_write("out", "broker down"),
                },
            ],
            succeeded: 1,
        };
        let message = err.to_string();
        assert!(message.contains("2 stream(s) failed"));
        assert!(message.contains("order:x"));
        assert_eq!(err.failed_ids(), vec!["order:x", "order:y"]);
        assert!(err.is_transient());
    }

    #[test]
    fn test_data_errors_are_not_transient() {
        let err = DispatchError::from(ContractError::malformed_notification("s:1", -5, "bad"));
        assert!(!err.is_transient());
        assert!(DispatchError::Timeout { timeout_ms: 10 }.is_transient());
    }
}
