//! Event validation hook for conflict detection

use async_trait::async_trait;

use crate::clock::ClockManager;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::{now_millis, SyncEvent};

/// Checks an event before its clock takes part in a comparison
///
/// Implementations may perform I/O (e.g. consult a device registry).
#[async_trait]
pub trait EventValidator: Send + Sync {
    async fn validate(&self, event: &SyncEvent) -> Result<()>;
}

/// Structural checks: clock shape, future timestamps, optional checksum
#[derive(Debug, Clone)]
pub struct DefaultEventValidator {
    max_future_skew_ms: i64,
    verify_checksums: bool,
}

impl DefaultEventValidator {
    pub fn new(max_future_skew_ms: i64, verify_checksums: bool) -> Self {
        Self {
            max_future_skew_ms,
            verify_checksums,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.max_future_skew_ms, config.verify_checksums)
    }
}

impl Default for DefaultEventValidator {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[async_trait]
impl EventValidator for DefaultEventValidator {
    async fn validate(&self, event: &SyncEvent) -> Result<()> {
        ClockManager::validate(event.vector_clock())?;
        event.check_timestamp(now_millis(), self.max_future_skew_ms)?;

        if self.verify_checksums && !event.verify_checksum() {
            return Err(SyncError::InvalidEvent {
                event_id: event.id().to_string(),
                reason: "checksum does not match payload".to_string(),
            });
        }

        Ok(())
    }
}
