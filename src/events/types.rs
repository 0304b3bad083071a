//! Sync event types
//!
//! Wire shape of a `SyncEvent`:
//!
//! ```json
//! {
//!   "id": "…",
//!   "type": "HighlightUpdated",
//!   "payload": { "id": "hl-1", "changes": { "color": "#ff0" } },
//!   "timestamp": 1718000000000,
//!   "deviceId": "phone",
//!   "vectorClock": { "phone": 3, "laptop": 1 },
//!   "checksum": "<64 hex chars>",
//!   "userId": "user-1"
//! }
//! ```

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::payload::EventPayload;
use crate::clock::LogicalClock;
use crate::error::{Result, SyncError};

/// Length of a hex-encoded SHA-256 checksum
pub const CHECKSUM_LEN: usize = 64;

/// Types of sync events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    HighlightCreated,
    HighlightUpdated,
    HighlightDeleted,
    CollectionCreated,
    CollectionUpdated,
    CollectionDeleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An immutable record of one state change
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSyncEvent")]
pub struct SyncEvent {
    id: String,
    payload: EventPayload,
    timestamp: i64,
    device_id: String,
    vector_clock: LogicalClock,
    checksum: String,
    user_id: String,
}

impl SyncEvent {
    /// Create an event stamped with the current time and a fresh ID
    pub fn new(
        payload: EventPayload,
        device_id: &str,
        user_id: &str,
        vector_clock: LogicalClock,
    ) -> Result<Self> {
        Self::with_timestamp(payload, device_id, user_id, vector_clock, now_millis())
    }

    /// Create an event with an explicit timestamp (ms since epoch)
    pub fn with_timestamp(
        payload: EventPayload,
        device_id: &str,
        user_id: &str,
        vector_clock: LogicalClock,
        timestamp: i64,
    ) -> Result<Self> {
        let checksum = compute_checksum(&payload)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            payload,
            timestamp,
            device_id: device_id.to_string(),
            vector_clock,
            checksum,
            user_id: user_id.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// ID of the entity this event affects
    pub fn entity_id(&self) -> &str {
        self.payload.entity_id()
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn vector_clock(&self) -> &LogicalClock {
        &self.vector_clock
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Whether the stored checksum matches the payload
    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.payload)
            .map(|c| c == self.checksum)
            .unwrap_or(false)
    }

    /// Reject events dated more than `max_skew_ms` after `now_ms`
    pub fn check_timestamp(&self, now_ms: i64, max_skew_ms: i64) -> Result<()> {
        if self.timestamp > now_ms.saturating_add(max_skew_ms) {
            return Err(SyncError::InvalidEvent {
                event_id: self.id.clone(),
                reason: format!(
                    "timestamp {} is {}ms in the future",
                    self.timestamp,
                    self.timestamp.saturating_sub(now_ms)
                ),
            });
        }
        Ok(())
    }

    /// Derive the resolved event for a conflict
    ///
    /// Keeps the type, device and user of `self`, swaps in `payload`, and
    /// stamps a fresh ID, the merged clock and the resolution time.
    pub(crate) fn resolved_from(
        &self,
        payload: EventPayload,
        merged_clock: LogicalClock,
        resolved_at: i64,
    ) -> Result<Self> {
        Self::with_timestamp(
            payload,
            &self.device_id,
            &self.user_id,
            merged_clock,
            resolved_at,
        )
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Hex-encoded SHA-256 of the payload's JSON encoding, keys sorted
pub fn compute_checksum(payload: &EventPayload) -> Result<String> {
    // Via `Value` so object keys are emitted sorted
    let bytes = serde_json::to_vec(&serde_json::to_value(payload)?)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Owned wire form, used for decoding
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSyncEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: EventType,
    payload: Value,
    timestamp: i64,
    device_id: String,
    vector_clock: LogicalClock,
    checksum: String,
    user_id: String,
}

/// Borrowed wire form, used for encoding
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSyncEvent<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    event_type: EventType,
    payload: &'a EventPayload,
    timestamp: i64,
    device_id: &'a str,
    vector_clock: &'a LogicalClock,
    checksum: &'a str,
    user_id: &'a str,
}

impl TryFrom<RawSyncEvent> for SyncEvent {
    type Error = SyncError;

    fn try_from(raw: RawSyncEvent) -> Result<Self> {
        let payload = EventPayload::from_value(raw.event_type, raw.payload).map_err(|e| {
            SyncError::InvalidEvent {
                event_id: raw.id.clone(),
                reason: format!("payload does not match {}: {}", raw.event_type, e),
            }
        })?;

        if raw.checksum.len() != CHECKSUM_LEN || !raw.checksum.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(SyncError::InvalidEvent {
                event_id: raw.id,
                reason: format!("checksum must be {} hex characters", CHECKSUM_LEN),
            });
        }

        Ok(Self {
            id: raw.id,
            payload,
            timestamp: raw.timestamp,
            device_id: raw.device_id,
            vector_clock: raw.vector_clock,
            checksum: raw.checksum,
            user_id: raw.user_id,
        })
    }
}

impl Serialize for SyncEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireSyncEvent {
            id: &self.id,
            event_type: self.event_type(),
            payload: &self.payload,
            timestamp: self.timestamp,
            device_id: &self.device_id,
            vector_clock: &self.vector_clock,
            checksum: &self.checksum,
            user_id: &self.user_id,
        }
        .serialize(serializer)
    }
}
