//! Event log records
//!
//! Immutable events, change markers and the change-feed notifications that
//! report writes of either.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ContractError, StreamKey};

/// Reserved version of a change marker row.
///
/// Real versions start at 1, so a negative sentinel can never collide with an
/// event. The event log write path enforces this (see [`Event::validate`]).
pub const CHANGE_MARKER_VERSION: i64 = -1001;

/// First version a stream's events may carry.
pub const FIRST_EVENT_VERSION: i64 = 1;

/// Immutable event as stored in the event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Composite stream key (`"{streamType}:{streamId}"`)
    pub id: StreamKey,

    /// Per-stream version, strictly increasing, starts at 1
    pub version: i64,

    /// Unique event identifier
    pub event_id: String,

    pub event_type: String,

    pub stream_id: String,

    pub stream_type: String,

    /// Epoch milliseconds set by the writer
    pub timestamp: i64,

    /// Writer-supplied transport headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Opaque payload
    #[serde(default)]
    pub data: Bytes,
}

impl Event {
    /// Check the writer contract: versions live in `1..`.
    ///
    /// # Errors
    /// [`ContractError::InvalidVersion`] for versions below
    /// [`FIRST_EVENT_VERSION`], which would overlap the marker sentinel.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.version < FIRST_EVENT_VERSION {
            return Err(ContractError::InvalidVersion {
                id: self.id.to_string(),
                version: self.version,
                message: format!("versions start at {FIRST_EVENT_VERSION}"),
            });
        }
        Ok(())
    }

    /// Notification the change feed emits for this event's write.
    pub fn notification(&self) -> StreamNotification {
        StreamNotification::new(self.id.clone(), self.version)
    }
}

/// Change-feed notification: the key of one written row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamNotification {
    pub id: StreamKey,
    pub version: i64,
}

/// What a notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A change marker was written; the stream should be dispatched
    ChangeMarker,
    /// A real event was written; a change marker should be recorded
    EventWrite,
}

impl StreamNotification {
    pub fn new(id: impl Into<StreamKey>, version: i64) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Notification emitted when a change marker row is written.
    pub fn marker(id: impl Into<StreamKey>) -> Self {
        Self::new(id, CHANGE_MARKER_VERSION)
    }

    /// Classify the notification.
    ///
    /// # Errors
    /// [`ContractError::MalformedNotification`] for an empty key or a version
    /// outside both the event domain and the sentinel.
    pub fn kind(&self) -> Result<NotificationKind, ContractError> {
        if self.id.is_empty() {
            return Err(ContractError::malformed_notification(
                "",
                self.version,
                "empty stream key",
            ));
        }
        match self.version {
            CHANGE_MARKER_VERSION => Ok(NotificationKind::ChangeMarker),
            v if v >= FIRST_EVENT_VERSION => Ok(NotificationKind::EventWrite),
            v => Err(ContractError::malformed_notification(
                self.id.as_str(),
                v,
                "version outside the event domain",
            )),
        }
    }
}
