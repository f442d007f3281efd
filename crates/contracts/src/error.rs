//! Layered error definitions
//!
//! Categorized by source: config / data / store / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Setting could not be resolved from the environment or a parameter reference
    #[error("config value '{name}' could not be resolved: {message}")]
    ConfigResolve { name: String, message: String },

    // ===== Data Errors =====
    /// Notification key outside both the event domain and the marker sentinel
    #[error("malformed notification for '{id}' (version {version}): {message}")]
    MalformedNotification {
        id: String,
        version: i64,
        message: String,
    },

    /// Event written with a version the log does not accept
    #[error("invalid version {version} for stream '{id}': {message}")]
    InvalidVersion {
        id: String,
        version: i64,
        message: String,
    },

    // ===== Store Errors =====
    /// Read or write against a keyed store failed
    #[error("store '{store}' {operation} failed: {message}")]
    Store {
        store: String,
        operation: String,
        message: String,
    },

    /// Conditional offset commit lost against another writer
    #[error("offset conflict for '{id}': expected version {expected}, found {actual}")]
    OffsetConflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create configuration resolve error
    pub fn config_resolve(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigResolve {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create malformed notification error
    pub fn malformed_notification(
        id: impl Into<String>,
        version: i64,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedNotification {
            id: id.into(),
            version,
            message: message.into(),
        }
    }

    /// Create store error
    pub fn store(
        store: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Store {
            store: store.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether redelivering the same notification batch can succeed.
    ///
    /// Data and configuration errors fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store { .. }
                | Self::OffsetConflict { .. }
                | Self::SinkWrite { .. }
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ContractError::store("events", "query", "throttled").is_transient());
        assert!(ContractError::sink_write("kafka", "broker down").is_transient());
        assert!(ContractError::OffsetConflict {
            id: "s:1".into(),
            expected: 2,
            actual: 3
        }
        .is_transient());
        assert!(!ContractError::malformed_notification("s:1", -2, "bad").is_transient());
        assert!(!ContractError::config_parse("bad toml").is_transient());
    }

    #[test]
    fn test_display_carries_context() {
        let err = ContractError::store("offsets", "batch_get", "timeout");
        assert_eq!(err.to_string(), "store 'offsets' batch_get failed: timeout");
    }
}
