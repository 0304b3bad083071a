//! Conflict resolution
//!
//! Turns a detected conflict into one resolved event under a caller-chosen
//! strategy. Whatever side wins, the resolved event carries the merge of
//! both sides' clocks, so it causally dominates everything in the conflict
//! and the same conflict cannot resurface on the next sync.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::merge::merge_payloads;
use super::strategy::ResolutionStrategy;
use crate::clock::{ClockManager, LogicalClock};
use crate::config::SyncConfig;
use crate::conflict::Conflict;
use crate::error::{Result, SyncError};
use crate::events::SyncEvent;
use crate::metrics::{as_millis_f64, exponential_average};
use crate::notify::{
    ConflictResolvedNotice, NoopChannel, NotificationChannel, CONFLICT_RESOLVED_TOPIC,
};

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub conflict_id: String,
    /// Event to persist in place of both sides
    pub event: SyncEvent,
    pub strategy: ResolutionStrategy,
    /// Merge of the latest local and latest remote clocks
    pub merged_clock: LogicalClock,
    pub resolved_at: DateTime<Utc>,
}

/// Out-of-band decision for a conflict routed to `Manual`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualDecision {
    KeepLocal,
    KeepRemote,
    /// No decision arrived in time; apply this strategy instead
    Fallback(ResolutionStrategy),
}

/// Successful resolutions per strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyCounts {
    pub last_write_wins: u64,
    pub local_wins: u64,
    pub remote_wins: u64,
    pub keep_both: u64,
    pub merge: u64,
    pub manual: u64,
}

impl StrategyCounts {
    pub fn get(&self, strategy: ResolutionStrategy) -> u64 {
        match strategy {
            ResolutionStrategy::LastWriteWins => self.last_write_wins,
            ResolutionStrategy::LocalWins => self.local_wins,
            ResolutionStrategy::RemoteWins => self.remote_wins,
            ResolutionStrategy::KeepBoth => self.keep_both,
            ResolutionStrategy::Merge => self.merge,
            ResolutionStrategy::Manual => self.manual,
        }
    }

    fn record(&mut self, strategy: ResolutionStrategy) {
        let slot = match strategy {
            ResolutionStrategy::LastWriteWins => &mut self.last_write_wins,
            ResolutionStrategy::LocalWins => &mut self.local_wins,
            ResolutionStrategy::RemoteWins => &mut self.remote_wins,
            ResolutionStrategy::KeepBoth => &mut self.keep_both,
            ResolutionStrategy::Merge => &mut self.merge,
            ResolutionStrategy::Manual => &mut self.manual,
        };
        *slot += 1;
    }
}

/// Snapshot of resolver metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMetrics {
    pub total_resolved: u64,
    pub resolutions_by_strategy: StrategyCounts,
    pub total_failed: u64,
    /// Weighted running average over successful resolutions, in milliseconds
    pub average_resolution_time: f64,
    /// Share of successful resolutions decided by a human
    pub manual_resolution_rate: f64,
}

/// Applies resolution strategies to detected conflicts
///
/// Holds a metrics accumulator; drive it from a single owner, and never
/// resolve the same conflict from two callers at once.
pub struct ConflictResolver {
    channel: Arc<dyn NotificationChannel>,
    latency_smoothing: f64,
    metrics: ResolutionMetrics,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(Arc::new(NoopChannel))
    }
}

impl ConflictResolver {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self::from_config(&SyncConfig::default(), channel)
    }

    pub fn from_config(config: &SyncConfig, channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            channel,
            latency_smoothing: config.latency_smoothing,
            metrics: ResolutionMetrics::default(),
        }
    }

    pub fn can_resolve(conflict: &Conflict, strategy: ResolutionStrategy) -> bool {
        strategy.applies_to(conflict.conflict_type())
    }

    /// Every strategy applicable to this conflict
    pub fn available_strategies(conflict: &Conflict) -> Vec<ResolutionStrategy> {
        ResolutionStrategy::ALL
            .into_iter()
            .filter(|s| Self::can_resolve(conflict, *s))
            .collect()
    }

    /// Resolve a conflict with the given strategy
    ///
    /// `Manual` always fails: route the conflict to a human and come back
    /// through [`ConflictResolver::apply_manual_decision`].
    pub async fn resolve(
        &mut self,
        conflict: &Conflict,
        strategy: ResolutionStrategy,
    ) -> Result<ResolutionResult> {
        let started = Instant::now();
        tracing::debug!(
            conflict_id = %conflict.id(),
            strategy = %strategy,
            state = "resolving",
            "Resolving conflict"
        );

        let outcome =
            check_strategy(conflict, strategy).and_then(|_| build(conflict, strategy, strategy));
        self.finish(conflict, outcome, started).await
    }

    /// Apply a human decision for a conflict routed to `Manual`
    pub async fn apply_manual_decision(
        &mut self,
        conflict: &Conflict,
        decision: ManualDecision,
    ) -> Result<ResolutionResult> {
        let started = Instant::now();
        tracing::debug!(
            conflict_id = %conflict.id(),
            decision = ?decision,
            state = "resolving",
            "Applying manual decision"
        );

        let outcome = match decision {
            ManualDecision::KeepLocal => {
                build(conflict, ResolutionStrategy::LocalWins, ResolutionStrategy::Manual)
            }
            ManualDecision::KeepRemote => {
                build(conflict, ResolutionStrategy::RemoteWins, ResolutionStrategy::Manual)
            }
            ManualDecision::Fallback(strategy) => {
                check_strategy(conflict, strategy).and_then(|_| build(conflict, strategy, strategy))
            }
        };
        self.finish(conflict, outcome, started).await
    }

    async fn finish(
        &mut self,
        conflict: &Conflict,
        outcome: Result<ResolutionResult>,
        started: Instant,
    ) -> Result<ResolutionResult> {
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.metrics.total_failed += 1;
                tracing::debug!(
                    conflict_id = %conflict.id(),
                    error = %e,
                    state = "failed",
                    "Conflict resolution failed"
                );
                return Err(e);
            }
        };

        let notice = ConflictResolvedNotice {
            conflict_id: result.conflict_id.clone(),
            strategy: result.strategy,
            resolution_id: result.event.id().to_string(),
        };
        match serde_json::to_value(&notice) {
            Ok(payload) => self.channel.publish(CONFLICT_RESOLVED_TOPIC, payload).await,
            Err(e) => tracing::warn!(error = %e, "Failed to encode resolution notice"),
        }

        self.record_success(result.strategy, started);
        tracing::debug!(
            conflict_id = %conflict.id(),
            resolution_id = %result.event.id(),
            merged_clock = %result.merged_clock,
            state = "resolved",
            "Conflict resolved"
        );

        Ok(result)
    }

    fn record_success(&mut self, strategy: ResolutionStrategy, started: Instant) {
        let m = &mut self.metrics;
        m.total_resolved += 1;
        m.resolutions_by_strategy.record(strategy);
        m.average_resolution_time = exponential_average(
            m.average_resolution_time,
            as_millis_f64(started.elapsed()),
            m.total_resolved,
            self.latency_smoothing,
        );
        m.manual_resolution_rate =
            m.resolutions_by_strategy.manual as f64 / m.total_resolved as f64;
    }

    /// Snapshot of the current metrics
    pub fn metrics(&self) -> ResolutionMetrics {
        self.metrics.clone()
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = ResolutionMetrics::default();
    }
}

fn check_strategy(conflict: &Conflict, strategy: ResolutionStrategy) -> Result<()> {
    let reason = if strategy == ResolutionStrategy::Manual {
        "manual conflicts must be decided out of band"
    } else if !ConflictResolver::can_resolve(conflict, strategy) {
        "strategy is not applicable to this conflict type"
    } else {
        return Ok(());
    };

    Err(SyncError::ResolutionStrategy {
        strategy,
        conflict_type: conflict.conflict_type(),
        reason: reason.to_string(),
    })
}

/// Pick the winning side with `strategy` and stamp the merged clock
///
/// `reported` is the strategy recorded on the result.
fn build(
    conflict: &Conflict,
    strategy: ResolutionStrategy,
    reported: ResolutionStrategy,
) -> Result<ResolutionResult> {
    let (local, remote) = match (conflict.last_local(), conflict.last_remote()) {
        (Some(local), Some(remote)) => (local, remote),
        _ => {
            return Err(SyncError::UnresolvableConflict {
                conflict_id: conflict.id().to_string(),
                reason: format!(
                    "{} local and {} remote events",
                    conflict.local().len(),
                    conflict.remote().len()
                ),
            })
        }
    };

    let (winner, payload) = match strategy {
        ResolutionStrategy::LastWriteWins => {
            // Remote wins ties
            let winner = if local.timestamp() > remote.timestamp() {
                local
            } else {
                remote
            };
            (winner, winner.payload().clone())
        }
        ResolutionStrategy::LocalWins => (local, local.payload().clone()),
        ResolutionStrategy::RemoteWins => (remote, remote.payload().clone()),
        ResolutionStrategy::KeepBoth => {
            tracing::warn!(
                conflict_id = %conflict.id(),
                entity_id = %conflict.entity_id(),
                "KeepBoth keeps the local event only; the remote side must be cloned by the caller"
            );
            (local, local.payload().clone())
        }
        ResolutionStrategy::Merge => match merge_payloads(local.payload(), remote.payload()) {
            Some(merged) => (local, merged),
            None => {
                tracing::debug!(
                    conflict_id = %conflict.id(),
                    local_type = %local.event_type(),
                    remote_type = %remote.event_type(),
                    "Payloads cannot be merged, keeping local event"
                );
                (local, local.payload().clone())
            }
        },
        ResolutionStrategy::Manual => {
            return Err(SyncError::ResolutionStrategy {
                strategy,
                conflict_type: conflict.conflict_type(),
                reason: "manual conflicts must be decided out of band".to_string(),
            })
        }
    };

    // No outcome can carry a clock past the device bound
    let merged_clock =
        ClockManager::merge(local.vector_clock(), remote.vector_clock()).map_err(|e| {
            SyncError::UnresolvableConflict {
                conflict_id: conflict.id().to_string(),
                reason: format!("clocks cannot be merged: {}", e),
            }
        })?;
    let resolved_at = Utc::now();
    let event = winner.resolved_from(payload, merged_clock.clone(), resolved_at.timestamp_millis())?;

    Ok(ResolutionResult {
        conflict_id: conflict.id().to_string(),
        event,
        strategy: reported,
        merged_clock,
        resolved_at,
    })
}
