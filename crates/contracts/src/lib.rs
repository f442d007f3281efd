//! # Contracts
//!
//! Frozen interface contracts shared by every crate: the event log data
//! model, the collaborator traits (event log, offset store, sink, change
//! feed), the unified error type and the configuration blueprint.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Version Model
//! - Real events carry versions `1..`, strictly increasing per stream
//! - Change markers share the stream key with version [`CHANGE_MARKER_VERSION`]
//! - An offset of 0 means nothing has been forwarded yet

mod blueprint;
mod error;
mod event;
mod feed;
mod message;
mod offset;
mod sink;
mod store;
mod stream_key;

pub use blueprint::*;
pub use error::*;
pub use event::*;
pub use feed::{ChangeFeed, LocalChangeFeed};
pub use message::*;
pub use offset::*;
pub use sink::{LocalMessageSink, MessageSink};
pub use store::*;
pub use stream_key::{StreamKey, STREAM_KEY_SEPARATOR};
