//! Error types for highlight sync
//!
//! Every failure here is operational: the sync orchestrator catches it and
//! decides whether to retry with another strategy, surface the conflict to
//! the user, or skip the entity for this pass.

use thiserror::Error;

use crate::conflict::ConflictType;
use crate::resolve::ResolutionStrategy;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// A logical clock failed structural validation
    #[error("Invalid vector clock: {0}")]
    InvalidVectorClock(String),

    /// A device identifier is empty or malformed
    #[error("Invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// Scanning a batch for conflicts failed; the whole batch is aborted
    #[error("Conflict detection failed for entity {entity_id}: {source}")]
    ConflictDetection {
        entity_id: String,
        #[source]
        source: Box<SyncError>,
    },

    /// Strategy is not applicable to the conflict (or is Manual)
    #[error("Strategy {strategy} cannot resolve {conflict_type} conflict: {reason}")]
    ResolutionStrategy {
        strategy: ResolutionStrategy,
        conflict_type: ConflictType,
        reason: String,
    },

    /// Conflict has no events on one side, or a strategy invariant failed
    #[error("Unresolvable conflict {conflict_id}: {reason}")]
    UnresolvableConflict { conflict_id: String, reason: String },

    /// Event is malformed (future timestamp, checksum mismatch, bad payload)
    #[error("Invalid event {event_id}: {reason}")]
    InvalidEvent { event_id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Wrap a failure encountered while scanning an entity
    pub fn detection(entity_id: &str, source: SyncError) -> Self {
        SyncError::ConflictDetection {
            entity_id: entity_id.to_string(),
            source: Box::new(source),
        }
    }

    /// Whether retrying with a different strategy could succeed
    pub fn is_strategy_error(&self) -> bool {
        matches!(self, SyncError::ResolutionStrategy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_keeps_source() {
        let err = SyncError::detection(
            "hl-1",
            SyncError::InvalidVectorClock("too many devices".to_string()),
        );

        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Invalid vector clock: too many devices")
        );
        assert!(err.to_string().contains("hl-1"));
    }

    #[test]
    fn test_strategy_error_display() {
        let err = SyncError::ResolutionStrategy {
            strategy: ResolutionStrategy::Merge,
            conflict_type: ConflictType::Delete,
            reason: "not applicable".to_string(),
        };

        assert!(err.is_strategy_error());
        assert_eq!(
            err.to_string(),
            "Strategy merge cannot resolve delete conflict: not applicable"
        );
    }
}
