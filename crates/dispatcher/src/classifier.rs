//! Notification classifier
//!
//! Splits a notification batch into streams whose change marker arrived
//! (dispatch now) and streams with fresh event writes (mark first).

use std::collections::HashSet;

use contracts::{ContractError, NotificationKind, StreamKey, StreamNotification};

/// Result of classifying one notification batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Streams with a change marker in the batch
    pub keys_to_dispatch: Vec<StreamKey>,
    /// Streams with real writes and no marker in the batch
    pub keys_to_record_changes: Vec<StreamKey>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.keys_to_dispatch.is_empty() && self.keys_to_record_changes.is_empty()
    }
}

/// Classify a batch.
///
/// Both lists hold unique ids in first-seen order. A stream with a marker
/// and a real write in the same batch is only dispatched. Any malformed
/// notification fails the whole batch.
pub fn classify(batch: &[StreamNotification]) -> Result<Classification, ContractError> {
    let mut markers = Vec::new();
    let mut writes = Vec::new();
    for notification in batch {
        match notification.kind()? {
            NotificationKind::ChangeMarker => markers.push(&notification.id),
            NotificationKind::EventWrite => writes.push(&notification.id),
        }
    }

    let mut seen = HashSet::new();
    let keys_to_dispatch: Vec<StreamKey> = markers
        .into_iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect();

    // `seen` already holds every dispatched id
    let keys_to_record_changes = writes
        .into_iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect();

    Ok(Classification {
        keys_to_dispatch,
        keys_to_record_changes,
    })
}
