//! Sync session
//!
//! Runs one reconcile pass over a local and a remote batch: detect
//! conflicts, pick a strategy per conflict type, resolve. Conflicts routed
//! to `Manual` are handed back to the caller untouched.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{StrategyDefaults, SyncConfig};
use crate::conflict::{Conflict, ConflictDetector, DetectionMetrics};
use crate::error::Result;
use crate::events::SyncEvent;
use crate::notify::NotificationChannel;
use crate::resolve::{
    ConflictResolver, ManualDecision, ResolutionMetrics, ResolutionResult, ResolutionStrategy,
};

/// A conflict the resolver could not settle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedResolution {
    pub conflict_id: String,
    pub entity_id: String,
    pub error: String,
}

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub resolved: Vec<ResolutionResult>,
    pub failed: Vec<FailedResolution>,
    /// Conflicts waiting on a human decision
    pub pending_manual: Vec<Conflict>,
}

impl SyncReport {
    pub fn conflict_count(&self) -> usize {
        self.resolved.len() + self.failed.len() + self.pending_manual.len()
    }
}

pub struct SyncSession {
    detector: ConflictDetector,
    resolver: ConflictResolver,
    strategies: StrategyDefaults,
    strategy_override: Option<ResolutionStrategy>,
    manual_fallback: ResolutionStrategy,
}

impl SyncSession {
    pub fn new(config: &SyncConfig, channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            detector: ConflictDetector::from_config(config),
            resolver: ConflictResolver::from_config(config, channel),
            strategies: config.strategies,
            strategy_override: None,
            manual_fallback: config.manual_fallback,
        }
    }

    /// Use `strategy` for every conflict it applies to
    pub fn set_strategy_override(&mut self, strategy: Option<ResolutionStrategy>) {
        self.strategy_override = strategy;
    }

    /// Strategy this session applies to `conflict`
    ///
    /// The override or configured default when applicable, otherwise the
    /// first applicable strategy that does not need a human.
    pub fn strategy_for(&self, conflict: &Conflict) -> ResolutionStrategy {
        let wanted = self
            .strategy_override
            .unwrap_or_else(|| self.strategies.for_type(conflict.conflict_type()));

        if ConflictResolver::can_resolve(conflict, wanted) {
            return wanted;
        }

        let fallback = ConflictResolver::available_strategies(conflict)
            .into_iter()
            .find(|s| *s != ResolutionStrategy::Manual)
            .unwrap_or(ResolutionStrategy::Manual);
        tracing::debug!(
            conflict_type = %conflict.conflict_type(),
            wanted = %wanted,
            fallback = %fallback,
            "Strategy not applicable, falling back"
        );
        fallback
    }

    /// Detect and resolve every conflict between two batches
    ///
    /// A detection failure aborts the pass. A failed resolution is recorded
    /// in the report and the remaining conflicts are still resolved.
    pub async fn reconcile(
        &mut self,
        local: &[SyncEvent],
        remote: &[SyncEvent],
    ) -> Result<SyncReport> {
        let conflicts = self.detector.detect_conflicts(local, remote).await?;
        let mut report = SyncReport::default();

        for conflict in conflicts {
            let strategy = self.strategy_for(&conflict);
            if strategy == ResolutionStrategy::Manual {
                report.pending_manual.push(conflict);
                continue;
            }

            match self.resolver.resolve(&conflict, strategy).await {
                Ok(result) => report.resolved.push(result),
                Err(e) => {
                    tracing::warn!(
                        conflict_id = %conflict.id(),
                        entity_id = %conflict.entity_id(),
                        error = %e,
                        "Failed to resolve conflict"
                    );
                    report.failed.push(FailedResolution {
                        conflict_id: conflict.id().to_string(),
                        entity_id: conflict.entity_id().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            local = local.len(),
            remote = remote.len(),
            resolved = report.resolved.len(),
            failed = report.failed.len(),
            pending_manual = report.pending_manual.len(),
            "Sync session finished"
        );

        Ok(report)
    }

    /// Settle a pending manual conflict
    ///
    /// `None` means no decision arrived in time and the configured manual
    /// fallback applies.
    pub async fn decide(
        &mut self,
        conflict: &Conflict,
        decision: Option<ManualDecision>,
    ) -> Result<ResolutionResult> {
        let decision =
            decision.unwrap_or(ManualDecision::Fallback(self.manual_fallback));
        self.resolver.apply_manual_decision(conflict, decision).await
    }

    pub fn detection_metrics(&self) -> DetectionMetrics {
        self.detector.metrics()
    }

    pub fn resolution_metrics(&self) -> ResolutionMetrics {
        self.resolver.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::clock::LogicalClock;
    use crate::conflict::ConflictType;
    use crate::events::{now_millis, DeletedEntity, EventPayload, HighlightChanges, HighlightUpdate};
    use crate::notify::NoopChannel;

    fn update(id: &str, changes: HighlightChanges, vc: LogicalClock, ts: i64) -> SyncEvent {
        SyncEvent::with_timestamp(
            EventPayload::HighlightUpdated(HighlightUpdate {
                id: id.to_string(),
                changes,
            }),
            "A",
            "user-1",
            vc,
            ts,
        )
        .unwrap()
    }

    fn recolor(id: &str, color: &str, vc: LogicalClock, ts: i64) -> SyncEvent {
        update(
            id,
            HighlightChanges {
                color: Some(color.to_string()),
                ..Default::default()
            },
            vc,
            ts,
        )
    }

    fn delete(id: &str, vc: LogicalClock, ts: i64) -> SyncEvent {
        SyncEvent::with_timestamp(
            EventPayload::HighlightDeleted(DeletedEntity { id: id.to_string() }),
            "B",
            "user-1",
            vc,
            ts,
        )
        .unwrap()
    }

    fn session(config: SyncConfig) -> SyncSession {
        SyncSession::new(&config, Arc::new(NoopChannel))
    }

    #[tokio::test]
    async fn test_reconcile_resolves_with_defaults() {
        let now = now_millis();
        let mut session = session(SyncConfig::default());

        let local = vec![recolor("hl-1", "red", clock!("A" => 1), now - 10)];
        let remote = vec![recolor("hl-1", "blue", clock!("B" => 1), now - 5)];

        let report = session.reconcile(&local, &remote).await.unwrap();
        assert_eq!(report.resolved.len(), 1);
        assert!(report.failed.is_empty());

        let resolved = &report.resolved[0];
        assert_eq!(resolved.strategy, ResolutionStrategy::LastWriteWins);
        assert_eq!(resolved.merged_clock, clock!("A" => 1, "B" => 1));
        assert_eq!(session.resolution_metrics().total_resolved, 1);
        assert_eq!(session.detection_metrics().total_detections, 1);
    }

    #[tokio::test]
    async fn test_manual_conflicts_are_pending() {
        let now = now_millis();
        let mut config = SyncConfig::default();
        config.strategies.delete = ResolutionStrategy::Manual;
        let mut session = session(config);

        let local = vec![recolor("hl-1", "red", clock!("A" => 1), now)];
        let remote = vec![delete("hl-1", clock!("B" => 1), now)];

        let report = session.reconcile(&local, &remote).await.unwrap();
        assert!(report.resolved.is_empty());
        assert_eq!(report.pending_manual.len(), 1);

        let pending = &report.pending_manual[0];
        assert_eq!(pending.conflict_type(), ConflictType::Delete);

        let result = session.decide(pending, None).await.unwrap();
        assert_eq!(result.strategy, ResolutionStrategy::LastWriteWins);

        let result = session
            .decide(pending, Some(ManualDecision::KeepLocal))
            .await
            .unwrap();
        assert_eq!(result.strategy, ResolutionStrategy::Manual);
    }

    #[tokio::test]
    async fn test_inapplicable_override_falls_back() {
        let now = now_millis();
        let mut session = session(SyncConfig::default());
        session.set_strategy_override(Some(ResolutionStrategy::Merge));

        let local = vec![recolor("hl-1", "red", clock!("A" => 1), now)];
        let remote = vec![delete("hl-1", clock!("B" => 1), now)];

        let report = session.reconcile(&local, &remote).await.unwrap();
        assert_eq!(report.resolved.len(), 1);
        assert_eq!(
            report.resolved[0].strategy,
            ResolutionStrategy::LastWriteWins
        );
    }

    #[tokio::test]
    async fn test_no_conflicts_for_causal_batches() {
        let now = now_millis();
        let mut session = session(SyncConfig::default());

        let local = vec![recolor("hl-1", "red", clock!("A" => 1), now)];
        let remote = vec![recolor("hl-1", "blue", clock!("A" => 1, "B" => 1), now)];

        let report = session.reconcile(&local, &remote).await.unwrap();
        assert_eq!(report.conflict_count(), 0);
    }

    #[tokio::test]
    async fn test_detection_failure_aborts() {
        let mut session = session(SyncConfig::default());
        let far_future = now_millis() + 10 * 60_000;

        let local = vec![recolor("hl-1", "red", clock!("A" => 1), far_future)];
        let remote = vec![recolor("hl-1", "blue", clock!("B" => 1), far_future)];

        assert!(session.reconcile(&local, &remote).await.is_err());
    }
}
