//! Configuration management for Amnesia sync

use std::env;
use std::str::FromStr;

use crate::conflict::ConflictType;
use crate::resolve::ResolutionStrategy;

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How far in the future an event timestamp may be (ms)
    pub max_future_skew_ms: i64,
    /// Weight of the newest sample in latency averages, in (0, 1]
    pub latency_smoothing: f64,
    /// Verify payload checksums during detection
    pub verify_checksums: bool,
    /// Strategy applied per conflict type by `SyncSession`
    pub strategies: StrategyDefaults,
    /// Strategy callers fall back to when a manual decision times out
    pub manual_fallback: ResolutionStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyDefaults {
    pub metadata: ResolutionStrategy,
    pub delete: ResolutionStrategy,
    pub position: ResolutionStrategy,
    pub content: ResolutionStrategy,
}

impl StrategyDefaults {
    pub fn for_type(&self, conflict_type: ConflictType) -> ResolutionStrategy {
        match conflict_type {
            ConflictType::Metadata => self.metadata,
            ConflictType::Delete => self.delete,
            ConflictType::Position => self.position,
            ConflictType::Content => self.content,
        }
    }
}

impl Default for StrategyDefaults {
    fn default() -> Self {
        StrategyDefaults {
            metadata: ResolutionStrategy::LastWriteWins,
            delete: ResolutionStrategy::RemoteWins,
            position: ResolutionStrategy::LastWriteWins,
            content: ResolutionStrategy::LastWriteWins,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_future_skew_ms: 60_000,
            latency_smoothing: 0.1,
            verify_checksums: false,
            strategies: StrategyDefaults::default(),
            manual_fallback: ResolutionStrategy::LastWriteWins,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; unset keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SyncConfig::default();

        let latency_smoothing: f64 =
            parse_or(&lookup, "SYNC_LATENCY_SMOOTHING", defaults.latency_smoothing)?;
        if !(latency_smoothing > 0.0 && latency_smoothing <= 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "SYNC_LATENCY_SMOOTHING".to_string(),
                value: latency_smoothing.to_string(),
            });
        }

        Ok(SyncConfig {
            max_future_skew_ms: parse_or(
                &lookup,
                "SYNC_MAX_FUTURE_SKEW_MS",
                defaults.max_future_skew_ms,
            )?,
            latency_smoothing,
            verify_checksums: parse_or(&lookup, "SYNC_VERIFY_CHECKSUMS", defaults.verify_checksums)?,
            strategies: StrategyDefaults {
                metadata: parse_or(&lookup, "SYNC_STRATEGY_METADATA", defaults.strategies.metadata)?,
                delete: parse_or(&lookup, "SYNC_STRATEGY_DELETE", defaults.strategies.delete)?,
                position: parse_or(&lookup, "SYNC_STRATEGY_POSITION", defaults.strategies.position)?,
                content: parse_or(&lookup, "SYNC_STRATEGY_CONTENT", defaults.strategies.content)?,
            },
            manual_fallback: parse_or(&lookup, "SYNC_MANUAL_FALLBACK", defaults.manual_fallback)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
