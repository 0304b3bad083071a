//! Event batch files
//!
//! A batch file is a JSON array of `SyncEvent`s, as exported by the event log.

use std::path::Path;

use super::types::SyncEvent;
use crate::error::Result;

/// Read a batch of events from a JSON file
pub async fn load_batch(path: impl AsRef<Path>) -> Result<Vec<SyncEvent>> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await?;
    let events: Vec<SyncEvent> = serde_json::from_str(&text)?;

    tracing::debug!(path = %path.display(), count = events.len(), "Loaded event batch");
    Ok(events)
}
