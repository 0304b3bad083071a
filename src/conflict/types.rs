//! Conflict types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::SyncEvent;

/// What kind of concurrent change happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    /// Color, note, tags or other non-structural fields
    Metadata,
    /// One side deleted the entity
    Delete,
    /// The highlighted range moved
    Position,
    /// The highlighted text changed
    Content,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictType::Metadata => "metadata",
            ConflictType::Delete => "delete",
            ConflictType::Position => "position",
            ConflictType::Content => "content",
        };
        f.write_str(s)
    }
}

/// Concurrent edits to one entity, pending resolution
///
/// `local` and `remote` hold that entity's events from each side in
/// ascending timestamp order. Only the detector creates conflicts; they
/// are encoded for reports but never decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    id: String,
    #[serde(rename = "type")]
    conflict_type: ConflictType,
    entity_id: String,
    local: Vec<SyncEvent>,
    remote: Vec<SyncEvent>,
    detected_at: DateTime<Utc>,
}

impl Conflict {
    pub(crate) fn new(
        conflict_type: ConflictType,
        entity_id: &str,
        local: Vec<SyncEvent>,
        remote: Vec<SyncEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conflict_type,
            entity_id: entity_id.to_string(),
            local,
            remote,
            detected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conflict_type(&self) -> ConflictType {
        self.conflict_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn local(&self) -> &[SyncEvent] {
        &self.local
    }

    pub fn remote(&self) -> &[SyncEvent] {
        &self.remote
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    /// Latest local event
    pub fn last_local(&self) -> Option<&SyncEvent> {
        self.local.last()
    }

    /// Latest remote event
    pub fn last_remote(&self) -> Option<&SyncEvent> {
        self.remote.last()
    }
}
