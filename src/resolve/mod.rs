//! Conflict resolution
//!
//! Strategies, the compatibility rules between strategies and conflict
//! types, and the resolver that applies them.

mod merge;
mod resolver;
mod strategy;

pub use resolver::{
    ConflictResolver, ManualDecision, ResolutionMetrics, ResolutionResult, StrategyCounts,
};
pub use strategy::{ResolutionStrategy, UnknownStrategy};
