//! Sync events
//!
//! Immutable records of highlight and collection changes, produced by the
//! event log and sync transport. The payload is typed per event type; the
//! wire shape is fixed (see [`SyncEvent`]).

mod batch;
mod payload;
mod types;

pub use batch::load_batch;
pub use payload::{
    Collection, CollectionChanges, CollectionUpdate, DeletedEntity, EventPayload, Highlight,
    HighlightChanges, HighlightUpdate,
};
pub use types::{compute_checksum, now_millis, EventType, SyncEvent, CHECKSUM_LEN};
