//! Event payloads
//!
//! One payload shape per event type. Every payload carries the `id` of the
//! entity it affects, which is what conflict detection groups on.
//!
//! Entity payloads reject keys they do not model. The `changes` objects of
//! updates keep unmodelled keys in `extra` so they survive a re-encode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::EventType;
use crate::error::{Result, SyncError};

/// A text highlight inside a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Highlight {
    /// Highlight ID (UUID)
    pub id: String,
    /// The book this highlight belongs to
    pub book_id: String,
    /// EPUB CFI of the highlighted range
    pub cfi: String,
    /// The highlighted text
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    /// Position through the book (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_percent: Option<f64>,
    /// Highlight color (CSS color value)
    pub color: String,
    /// Optional user note attached to the highlight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update to a highlight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HighlightUpdate {
    pub id: String,
    pub changes: HighlightChanges,
}

/// Fields changed by a highlight update; `None` means untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_percent: Option<f64>,
    /// Highlighted ranges, as produced by the reader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Changed fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HighlightChanges {
    /// Whether the highlighted range moved
    pub fn touches_position(&self) -> bool {
        self.cfi.is_some() || self.page_percent.is_some() || self.ranges.is_some()
    }

    /// Whether the highlighted text itself changed
    pub fn touches_text(&self) -> bool {
        self.text.is_some()
    }

    /// Names of the changed fields, in wire form
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.cfi.is_some() {
            fields.push("cfi");
        }
        if self.page_percent.is_some() {
            fields.push("pagePercent");
        }
        if self.ranges.is_some() {
            fields.push("ranges");
        }
        if self.text.is_some() {
            fields.push("text");
        }
        if self.chapter.is_some() {
            fields.push("chapter");
        }
        if self.color.is_some() {
            fields.push("color");
        }
        if self.annotation.is_some() {
            fields.push("annotation");
        }
        if self.tags.is_some() {
            fields.push("tags");
        }
        fields
    }
}

/// A named collection of highlights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub highlight_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionUpdate {
    pub id: String,
    pub changes: CollectionChanges,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_ids: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to a deleted entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletedEntity {
    pub id: String,
}

/// Payload of a sync event, one variant per event type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    HighlightCreated(Highlight),
    HighlightUpdated(HighlightUpdate),
    HighlightDeleted(DeletedEntity),
    CollectionCreated(Collection),
    CollectionUpdated(CollectionUpdate),
    CollectionDeleted(DeletedEntity),
}

impl EventPayload {
    /// Event type this payload belongs to
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::HighlightCreated(_) => EventType::HighlightCreated,
            EventPayload::HighlightUpdated(_) => EventType::HighlightUpdated,
            EventPayload::HighlightDeleted(_) => EventType::HighlightDeleted,
            EventPayload::CollectionCreated(_) => EventType::CollectionCreated,
            EventPayload::CollectionUpdated(_) => EventType::CollectionUpdated,
            EventPayload::CollectionDeleted(_) => EventType::CollectionDeleted,
        }
    }

    /// ID of the affected entity
    pub fn entity_id(&self) -> &str {
        match self {
            EventPayload::HighlightCreated(h) => &h.id,
            EventPayload::HighlightUpdated(u) => &u.id,
            EventPayload::HighlightDeleted(d) => &d.id,
            EventPayload::CollectionCreated(c) => &c.id,
            EventPayload::CollectionUpdated(u) => &u.id,
            EventPayload::CollectionDeleted(d) => &d.id,
        }
    }

    /// Changed fields when this is a highlight update
    pub fn highlight_changes(&self) -> Option<&HighlightChanges> {
        match self {
            EventPayload::HighlightUpdated(u) => Some(&u.changes),
            _ => None,
        }
    }

    /// Decode a payload from its wire JSON for the given event type
    pub fn from_value(event_type: EventType, value: Value) -> Result<Self> {
        let payload = match event_type {
            EventType::HighlightCreated => {
                EventPayload::HighlightCreated(serde_json::from_value(value)?)
            }
            EventType::HighlightUpdated => {
                EventPayload::HighlightUpdated(serde_json::from_value(value)?)
            }
            EventType::HighlightDeleted => {
                EventPayload::HighlightDeleted(serde_json::from_value(value)?)
            }
            EventType::CollectionCreated => {
                EventPayload::CollectionCreated(serde_json::from_value(value)?)
            }
            EventType::CollectionUpdated => {
                EventPayload::CollectionUpdated(serde_json::from_value(value)?)
            }
            EventType::CollectionDeleted => {
                EventPayload::CollectionDeleted(serde_json::from_value(value)?)
            }
        };

        if !crate::clock::is_valid_device_id(payload.entity_id()) {
            return Err(SyncError::InvalidEvent {
                event_id: payload.entity_id().to_string(),
                reason: "payload id must be a non-empty identifier".to_string(),
            });
        }

        Ok(payload)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
