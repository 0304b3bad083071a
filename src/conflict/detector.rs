//! Conflict detection
//!
//! Groups two independently produced event batches by entity and flags every
//! entity whose latest local and latest remote clocks are concurrent.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::types::{Conflict, ConflictType};
use super::validator::{DefaultEventValidator, EventValidator};
use crate::clock::{ClockManager, ClockOrdering};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::{EventType, SyncEvent};
use crate::metrics::{as_millis_f64, exponential_average};

/// Conflict counts per type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictTypeCounts {
    pub metadata: u64,
    pub delete: u64,
    pub position: u64,
    pub content: u64,
}

impl ConflictTypeCounts {
    pub fn get(&self, conflict_type: ConflictType) -> u64 {
        match conflict_type {
            ConflictType::Metadata => self.metadata,
            ConflictType::Delete => self.delete,
            ConflictType::Position => self.position,
            ConflictType::Content => self.content,
        }
    }

    fn record(&mut self, conflict_type: ConflictType) {
        let slot = match conflict_type {
            ConflictType::Metadata => &mut self.metadata,
            ConflictType::Delete => &mut self.delete,
            ConflictType::Position => &mut self.position,
            ConflictType::Content => &mut self.content,
        };
        *slot += 1;
    }
}

/// Snapshot of detector metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionMetrics {
    pub total_conflicts: u64,
    pub conflicts_by_type: ConflictTypeCounts,
    /// Weighted running average, in milliseconds
    pub average_detection_latency: f64,
    pub total_detections: u64,
}

/// Finds and classifies concurrent edits between two event batches
///
/// Holds a metrics accumulator; drive it from a single owner.
pub struct ConflictDetector {
    validator: Box<dyn EventValidator>,
    latency_smoothing: f64,
    metrics: DetectionMetrics,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictDetector {
    pub fn new() -> Self {
        Self::from_config(&SyncConfig::default())
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            validator: Box::new(DefaultEventValidator::from_config(config)),
            latency_smoothing: config.latency_smoothing,
            metrics: DetectionMetrics::default(),
        }
    }

    /// Replace the event validator consulted before each comparison
    pub fn with_validator(mut self, validator: impl EventValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Group events by affected entity, each group sorted by timestamp
    pub fn group_by_entity(events: &[SyncEvent]) -> BTreeMap<String, Vec<SyncEvent>> {
        group_refs(events)
            .into_iter()
            .map(|(entity_id, group)| {
                (
                    entity_id.to_string(),
                    group.into_iter().cloned().collect(),
                )
            })
            .collect()
    }

    /// Find every entity edited concurrently on both sides
    ///
    /// Any validation or comparison failure aborts the whole batch.
    pub async fn detect_conflicts(
        &mut self,
        local: &[SyncEvent],
        remote: &[SyncEvent],
    ) -> Result<Vec<Conflict>> {
        let started = Instant::now();
        let outcome = self.scan(local, remote).await;

        self.metrics.total_detections += 1;
        self.metrics.average_detection_latency = exponential_average(
            self.metrics.average_detection_latency,
            as_millis_f64(started.elapsed()),
            self.metrics.total_detections,
            self.latency_smoothing,
        );

        match &outcome {
            Ok(conflicts) => {
                for conflict in conflicts {
                    self.metrics.total_conflicts += 1;
                    self.metrics.conflicts_by_type.record(conflict.conflict_type());
                }
                tracing::debug!(
                    local = local.len(),
                    remote = remote.len(),
                    conflicts = conflicts.len(),
                    "Conflict detection finished"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Conflict detection aborted");
            }
        }

        outcome
    }

    async fn scan(&self, local: &[SyncEvent], remote: &[SyncEvent]) -> Result<Vec<Conflict>> {
        let local_groups = group_refs(local);
        let remote_groups = group_refs(remote);
        let mut conflicts = Vec::new();

        for (entity_id, local_events) in &local_groups {
            let Some(remote_events) = remote_groups.get(entity_id) else {
                continue;
            };
            let (Some(local_latest), Some(remote_latest)) =
                (local_events.last(), remote_events.last())
            else {
                continue;
            };

            for event in [local_latest, remote_latest] {
                self.validator
                    .validate(event)
                    .await
                    .map_err(|e| SyncError::detection(entity_id, e))?;
            }

            let ordering =
                ClockManager::compare(local_latest.vector_clock(), remote_latest.vector_clock())
                    .map_err(|e| SyncError::detection(entity_id, e))?;

            if ordering != ClockOrdering::Concurrent {
                continue;
            }

            let conflict_type = Self::classify(local_latest, remote_latest);
            tracing::debug!(
                entity_id = %entity_id,
                conflict_type = %conflict_type,
                local_clock = %local_latest.vector_clock(),
                remote_clock = %remote_latest.vector_clock(),
                state = "detected",
                "Concurrent edit detected"
            );

            conflicts.push(Conflict::new(
                conflict_type,
                entity_id,
                local_events.iter().map(|e| (*e).clone()).collect(),
                remote_events.iter().map(|e| (*e).clone()).collect(),
            ));
        }

        Ok(conflicts)
    }

    /// Whether two events edit the same entity concurrently
    pub fn has_conflict(local: &SyncEvent, remote: &SyncEvent) -> Result<bool> {
        if local.entity_id() != remote.entity_id() {
            return Ok(false);
        }
        let ordering = ClockManager::compare(local.vector_clock(), remote.vector_clock())?;
        Ok(ordering == ClockOrdering::Concurrent)
    }

    /// Classify a conflict from the latest event on each side
    pub fn classify(local_latest: &SyncEvent, remote_latest: &SyncEvent) -> ConflictType {
        let (local_type, remote_type) = (local_latest.event_type(), remote_latest.event_type());

        if local_type == EventType::HighlightDeleted || remote_type == EventType::HighlightDeleted
        {
            return ConflictType::Delete;
        }

        match (
            local_latest.payload().highlight_changes(),
            remote_latest.payload().highlight_changes(),
        ) {
            (Some(local), Some(remote)) => {
                if local.touches_position() || remote.touches_position() {
                    ConflictType::Position
                } else if local.touches_text() || remote.touches_text() {
                    ConflictType::Content
                } else {
                    ConflictType::Metadata
                }
            }
            _ => ConflictType::Metadata,
        }
    }

    /// Snapshot of the current metrics
    pub fn metrics(&self) -> DetectionMetrics {
        self.metrics.clone()
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = DetectionMetrics::default();
    }
}

fn group_refs(events: &[SyncEvent]) -> BTreeMap<&str, Vec<&SyncEvent>> {
    let mut groups: BTreeMap<&str, Vec<&SyncEvent>> = BTreeMap::new();
    for event in events {
        groups.entry(event.entity_id()).or_default().push(event);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|e| e.timestamp());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::clock::LogicalClock;
    use crate::events::{DeletedEntity, EventPayload, HighlightChanges, HighlightUpdate};
    use async_trait::async_trait;

    fn update(entity: &str, changes: HighlightChanges, vc: LogicalClock, ts: i64) -> SyncEvent {
        SyncEvent::with_timestamp(
            EventPayload::HighlightUpdated(HighlightUpdate {
                id: entity.to_string(),
                changes,
            }),
            "device",
            "user-1",
            vc,
            ts,
        )
        .unwrap()
    }

    fn color_change(entity: &str, vc: LogicalClock, ts: i64) -> SyncEvent {
        update(
            entity,
            HighlightChanges {
                color: Some("#00ff00".to_string()),
                ..Default::default()
            },
            vc,
            ts,
        )
    }

    fn delete(entity: &str, vc: LogicalClock, ts: i64) -> SyncEvent {
        SyncEvent::with_timestamp(
            EventPayload::HighlightDeleted(DeletedEntity {
                id: entity.to_string(),
            }),
            "device",
            "user-1",
            vc,
            ts,
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_entity_sorts_by_timestamp() {
        let events = vec![
            color_change("hl-1", clock!("A" => 2), 300),
            color_change("hl-2", clock!("A" => 1), 100),
            color_change("hl-1", clock!("A" => 1), 200),
        ];

        let groups = ConflictDetector::group_by_entity(&events);
        assert_eq!(groups.len(), 2);

        let hl1 = &groups["hl-1"];
        assert_eq!(hl1.len(), 2);
        assert_eq!(hl1[0].timestamp(), 200);
        assert_eq!(hl1[1].timestamp(), 300);
    }

    #[tokio::test]
    async fn test_concurrent_clocks_conflict() {
        let mut detector = ConflictDetector::new();
        let local = vec![color_change("hl-1", clock!("A" => 1), 100)];
        let remote = vec![color_change("hl-1", clock!("B" => 1), 100)];

        let conflicts = detector.detect_conflicts(&local, &remote).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].entity_id(), "hl-1");
        assert_eq!(conflicts[0].conflict_type(), ConflictType::Metadata);
    }

    #[tokio::test]
    async fn test_ordered_clocks_do_not_conflict() {
        let mut detector = ConflictDetector::new();
        let local = vec![color_change("hl-1", clock!("A" => 1), 100)];
        let remote = vec![color_change("hl-1", clock!("A" => 2), 200)];

        let conflicts = detector.detect_conflicts(&local, &remote).await.unwrap();
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_only_latest_event_compared() {
        let mut detector = ConflictDetector::new();
        // Early local event is concurrent with remote, but the latest one
        // has already seen the remote edit.
        let local = vec![
            color_change("hl-1", clock!("A" => 1), 100),
            color_change("hl-1", clock!("A" => 2, "B" => 1), 300),
        ];
        let remote = vec![color_change("hl-1", clock!("B" => 1), 200)];

        let conflicts = detector.detect_conflicts(&local, &remote).await.unwrap();
        assert!(conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_one_sided_entities_ignored() {
        let mut detector = ConflictDetector::new();
        let local = vec![color_change("hl-1", clock!("A" => 1), 100)];
        let remote = vec![color_change("hl-2", clock!("B" => 1), 100)];

        assert!(detector
            .detect_conflicts(&local, &remote)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_invalid_clock_aborts_batch() {
        let mut detector = ConflictDetector::new();
        let local = vec![
            color_change("hl-1", clock!("A" => 1), 100),
            color_change("hl-2", clock!("" => 1), 100),
        ];
        let remote = vec![
            color_change("hl-1", clock!("B" => 1), 100),
            color_change("hl-2", clock!("B" => 1), 100),
        ];

        let result = detector.detect_conflicts(&local, &remote).await;
        match result {
            Err(SyncError::ConflictDetection { entity_id, source }) => {
                assert_eq!(entity_id, "hl-2");
                assert!(matches!(*source, SyncError::InvalidVectorClock(_)));
            }
            other => panic!("expected detection error, got {:?}", other),
        }

        let metrics = detector.metrics();
        assert_eq!(metrics.total_detections, 1);
        assert_eq!(metrics.total_conflicts, 0);
    }

    #[tokio::test]
    async fn test_custom_validator_failure_aborts() {
        struct RejectAll;

        #[async_trait]
        impl EventValidator for RejectAll {
            async fn validate(&self, event: &SyncEvent) -> Result<()> {
                Err(SyncError::InvalidEvent {
                    event_id: event.id().to_string(),
                    reason: "unknown device".to_string(),
                })
            }
        }

        let mut detector = ConflictDetector::new().with_validator(RejectAll);
        let local = vec![color_change("hl-1", clock!("A" => 1), 100)];
        let remote = vec![color_change("hl-1", clock!("B" => 1), 100)];

        assert!(matches!(
            detector.detect_conflicts(&local, &remote).await,
            Err(SyncError::ConflictDetection { .. })
        ));
    }

    #[test]
    fn test_has_conflict() {
        let a = color_change("hl-1", clock!("A" => 1), 100);
        let b = color_change("hl-1", clock!("B" => 1), 100);
        let c = color_change("hl-2", clock!("B" => 1), 100);
        let d = color_change("hl-1", clock!("A" => 2), 100);

        assert!(ConflictDetector::has_conflict(&a, &b).unwrap());
        assert!(!ConflictDetector::has_conflict(&a, &c).unwrap());
        assert!(!ConflictDetector::has_conflict(&a, &d).unwrap());
    }

    #[test]
    fn test_classify() {
        let vc = clock!("A" => 1);
        let position = update(
            "hl-1",
            HighlightChanges {
                cfi: Some("epubcfi(/6/4!/4/2/1:10)".to_string()),
                ..Default::default()
            },
            vc.clone(),
            1,
        );
        let text = update(
            "hl-1",
            HighlightChanges {
                text: Some("new text".to_string()),
                ..Default::default()
            },
            vc.clone(),
            1,
        );
        let color = color_change("hl-1", vc.clone(), 1);
        let deleted = delete("hl-1", vc.clone(), 1);

        assert_eq!(ConflictDetector::classify(&color, &deleted), ConflictType::Delete);
        assert_eq!(ConflictDetector::classify(&deleted, &text), ConflictType::Delete);
        assert_eq!(ConflictDetector::classify(&text, &position), ConflictType::Position);
        assert_eq!(ConflictDetector::classify(&color, &text), ConflictType::Content);
        assert_eq!(ConflictDetector::classify(&color, &color), ConflictType::Metadata);
    }

    #[tokio::test]
    async fn test_metrics_accumulate() {
        let mut detector = ConflictDetector::new();
        let local = vec![
            color_change("hl-1", clock!("A" => 1), 100),
            delete("hl-2", clock!("A" => 1), 100),
        ];
        let remote = vec![
            color_change("hl-1", clock!("B" => 1), 100),
            color_change("hl-2", clock!("B" => 1), 100),
        ];

        detector.detect_conflicts(&local, &remote).await.unwrap();
        detector.detect_conflicts(&local, &local).await.unwrap();

        let metrics = detector.metrics();
        assert_eq!(metrics.total_detections, 2);
        assert_eq!(metrics.total_conflicts, 2);
        assert_eq!(metrics.conflicts_by_type.get(ConflictType::Metadata), 1);
        assert_eq!(metrics.conflicts_by_type.get(ConflictType::Delete), 1);
        assert!(metrics.average_detection_latency >= 0.0);

        detector.reset_metrics();
        assert_eq!(detector.metrics(), DetectionMetrics::default());
    }
}
