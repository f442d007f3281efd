//! EventStore - event log and offset store operations used by the dispatcher

use std::collections::HashMap;
use std::future::Future;

use contracts::{ContractError, Event, EventLog, Offset, OffsetStore, PageCursor, StreamKey};
use tracing::{debug, instrument};

/// Most ids a single marker write request may carry
pub const MAX_MARKERS_PER_REQUEST: usize = 25;

/// Most ids a single offset point-read may carry
pub const MAX_OFFSETS_PER_REQUEST: usize = 100;

/// Outcome of a catch-up read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Non-empty pages handed to the page handler
    pub pages: usize,
    /// Events across those pages
    pub events: usize,
    /// Highest version handed out, if any
    pub last_version: Option<i64>,
}

/// Facade over the event log and offset store
///
/// Holds the process-lifetime store handles; every method is safe to call
/// from concurrently running stream pipelines.
pub struct EventStore<L, O> {
    events: L,
    offsets: O,
}

impl<L, O> EventStore<L, O>
where
    L: EventLog + Sync,
    O: OffsetStore + Sync,
{
    pub fn new(events: L, offsets: O) -> Self {
        Self { events, offsets }
    }

    pub fn event_log(&self) -> &L {
        &self.events
    }

    pub fn offset_store(&self) -> &O {
        &self.offsets
    }

    /// Write one change marker per id.
    ///
    /// Returns the number of markers written. An empty slice issues no request.
    #[instrument(
        name = "event_store_register_changes",
        skip(self, ids),
        fields(store = %self.events.name(), count = ids.len())
    )]
    pub async fn register_changes(&self, ids: &[StreamKey]) -> Result<usize, ContractError> {
        for chunk in ids.chunks(MAX_MARKERS_PER_REQUEST) {
            self.events.put_markers(chunk).await?;
        }
        if !ids.is_empty() {
            debug!(markers = ids.len(), "Change markers written");
        }
        Ok(ids.len())
    }

    /// Read stored offsets; ids without an offset are absent from the map.
    ///
    /// An empty slice issues no request.
    #[instrument(
        name = "event_store_get_offsets",
        skip(self, ids),
        fields(store = %self.offsets.name(), count = ids.len())
    )]
    pub async fn get_offsets(
        &self,
        ids: &[StreamKey],
    ) -> Result<HashMap<StreamKey, Offset>, ContractError> {
        let mut offsets = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_OFFSETS_PER_REQUEST) {
            for offset in self.offsets.batch_get(chunk).await? {
                offsets.insert(offset.id.clone(), offset);
            }
        }
        Ok(offsets)
    }

    /// Unconditional upsert of an offset
    pub async fn commit_offset(&self, offset: &Offset) -> Result<(), ContractError> {
        self.offsets.put(offset).await
    }

    /// Upsert an offset only if the stored version still equals `expected`
    pub async fn commit_offset_if(
        &self,
        offset: &Offset,
        expected: i64,
    ) -> Result<(), ContractError> {
        self.offsets.put_if(offset, expected).await
    }

    /// Page through every event of `after.id` with a version above `after.version`.
    ///
    /// Non-empty pages are handed to `on_page` in ascending order; the next
    /// page is only fetched once the handler's future has completed. Empty
    /// pages are skipped without ending the scan. The first error, from the
    /// store or the handler, stops the scan and is returned.
    #[instrument(
        name = "event_store_read_events_after",
        skip(self, after, on_page),
        fields(stream = %after.id, after_version = after.version)
    )]
    pub async fn read_events_after<F, Fut, E>(
        &self,
        after: &Offset,
        mut on_page: F,
    ) -> Result<ReadSummary, E>
    where
        F: FnMut(Vec<Event>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<ContractError>,
    {
        let mut summary = ReadSummary::default();
        let mut cursor: Option<PageCursor> = None;

        loop {
            let page = self
                .events
                .query_page(&after.id, after.version, cursor.as_ref())
                .await?;

            if let Some(last) = page.events.last() {
                summary.pages += 1;
                summary.events += page.events.len();
                summary.last_version = Some(last.version);
                on_page(page.events).await?;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            pages = summary.pages,
            events = summary.events,
            "Catch-up read finished"
        );
        Ok(summary)
    }
}
