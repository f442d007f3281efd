//! Keyed-store contracts - event log and offset store
//!
//! Both stores are external; only the operations the dispatcher relies on
//! are modelled here. Implementations must be cheap to share by reference
//! across concurrently running stream pipelines.

use crate::{ContractError, Event, Offset, StreamKey};

/// Last key evaluated by a range query; resumes the next page after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub id: StreamKey,
    pub version: i64,
}

/// One page of a range query
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events in ascending version order (may be empty)
    pub events: Vec<Event>,
    /// Present when the store may hold further results
    pub next_cursor: Option<PageCursor>,
}

/// Append-only event log keyed by `(id, version)`
#[trait_variant::make(EventLog: Send)]
pub trait LocalEventLog {
    /// Store name (used for logging)
    fn name(&self) -> &str;

    /// Fetch one page of events for `id` with `version > after_version`,
    /// ascending, in the store's native page size.
    ///
    /// `cursor` is the `next_cursor` of the previous page, `None` for the first.
    async fn query_page(
        &self,
        id: &StreamKey,
        after_version: i64,
        cursor: Option<&PageCursor>,
    ) -> Result<EventPage, ContractError>;

    /// Write one change marker row per id (idempotent per id).
    ///
    /// Callers never pass an empty slice or more ids than the store accepts
    /// in one request.
    async fn put_markers(&self, ids: &[StreamKey]) -> Result<(), ContractError>;

    /// Append real events (writer side).
    ///
    /// # Errors
    /// [`ContractError::InvalidVersion`] if any event violates the version
    /// domain or does not follow its stream's latest version.
    async fn append(&self, events: &[Event]) -> Result<(), ContractError>;
}

/// Durable `id -> last forwarded version` map
#[trait_variant::make(OffsetStore: Send)]
pub trait LocalOffsetStore {
    /// Store name (used for logging)
    fn name(&self) -> &str;

    /// Point-read offsets; ids without a stored offset are omitted.
    async fn batch_get(&self, ids: &[StreamKey]) -> Result<Vec<Offset>, ContractError>;

    /// Unconditional upsert.
    async fn put(&self, offset: &Offset) -> Result<(), ContractError>;

    /// Upsert only if the stored version equals `expected` (absent counts as 0).
    ///
    /// # Errors
    /// [`ContractError::OffsetConflict`] when the precondition fails.
    async fn put_if(&self, offset: &Offset, expected: i64) -> Result<(), ContractError>;
}
