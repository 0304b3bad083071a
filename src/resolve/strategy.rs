//! Resolution strategies and their compatibility with conflict types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictType;

/// How to collapse two concurrent edits into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Later timestamp wins; remote wins ties
    LastWriteWins,
    /// Keep the local edit
    LocalWins,
    /// Keep the remote edit
    RemoteWins,
    /// Keep the local edit as canonical; the remote side must be cloned by
    /// a caller that holds full entity state
    KeepBoth,
    /// Shallow field union, local fields win on collision
    Merge,
    /// Route to a human decision
    Manual,
}

impl ResolutionStrategy {
    pub const ALL: [ResolutionStrategy; 6] = [
        ResolutionStrategy::LastWriteWins,
        ResolutionStrategy::LocalWins,
        ResolutionStrategy::RemoteWins,
        ResolutionStrategy::KeepBoth,
        ResolutionStrategy::Merge,
        ResolutionStrategy::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::LastWriteWins => "last_write_wins",
            ResolutionStrategy::LocalWins => "local_wins",
            ResolutionStrategy::RemoteWins => "remote_wins",
            ResolutionStrategy::KeepBoth => "keep_both",
            ResolutionStrategy::Merge => "merge",
            ResolutionStrategy::Manual => "manual",
        }
    }

    /// Whether this strategy may resolve a conflict of the given type
    ///
    /// | Conflict | Disallowed |
    /// |----------|------------|
    /// | Metadata | KeepBoth |
    /// | Delete   | Merge, KeepBoth |
    /// | Position | none |
    /// | Content  | Merge |
    pub fn applies_to(&self, conflict_type: ConflictType) -> bool {
        use ResolutionStrategy::*;

        match conflict_type {
            ConflictType::Metadata => !matches!(self, KeepBoth),
            ConflictType::Delete => !matches!(self, Merge | KeepBoth),
            ConflictType::Position => true,
            ConflictType::Content => !matches!(self, Merge),
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown strategy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resolution strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for ResolutionStrategy {
    type Err = UnknownStrategy;

    /// Accepts `last_write_wins`, `last-write-wins` and `LastWriteWins` forms
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        ResolutionStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().replace('_', "") == normalized)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}
