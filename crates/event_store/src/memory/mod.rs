//! In-memory store backends
//!
//! Stand-ins for the external keyed stores, used by tests and by the CLI's
//! local runs. Handles are cheap to clone and share state.

mod event_log;
mod feed;
mod offset_store;
mod stats;

pub use event_log::MemoryEventLog;
pub use feed::MemoryChangeFeed;
pub use offset_store::MemoryOffsetStore;
pub use stats::{LogStatsSnapshot, OffsetStatsSnapshot};

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use bytes::Bytes;
use contracts::{Event, StreamKey};

/// Generate events for one stream with the given versions.
///
/// Payloads and ids are derived from the version so assertions can check
/// ordering from the message body alone.
pub fn synthetic_events(stream_type: &str, stream_id: &str, versions: RangeInclusive<i64>) -> Vec<Event> {
    let id = StreamKey::compose(stream_type, stream_id);
    versions
        .map(|version| Event {
            id: id.clone(),
            version,
            event_id: format!("{id}#{version}"),
            event_type: "Recorded".to_string(),
            stream_id: stream_id.to_string(),
            stream_type: stream_type.to_string(),
            timestamp: 1_700_000_000_000 + version,
            headers: BTreeMap::new(),
            data: Bytes::from(format!("{{\"version\":{version}}}")),
        })
        .collect()
}
