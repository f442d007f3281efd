//! # Event Store
//!
//! Event log and offset store access for the dispatcher.
//!
//! Responsibilities:
//! - Write change markers in request-sized chunks
//! - Batch-read and commit per-stream offsets
//! - Catch-up reads: strictly sequential, version-ascending page scans
//! - In-memory backends with a change feed for tests and local runs

pub mod memory;
mod store;

pub use contracts::{Event, EventLog, Offset, OffsetStore, StreamKey};
pub use store::{EventStore, ReadSummary, MAX_MARKERS_PER_REQUEST, MAX_OFFSETS_PER_REQUEST};
