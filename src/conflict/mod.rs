//! Conflict detection
//!
//! Provides:
//! - `ConflictDetector`: groups local and remote batches by entity and flags
//!   entities whose latest clocks are concurrent
//! - `Conflict`: one entity's concurrent edits, consumed by the resolver
//! - `EventValidator`: hook consulted before every clock comparison
//!
//! # Classification
//!
//! - Either side deleted the highlight: `Delete`
//! - Both sides updated the highlight: `Position` if either moved the range,
//!   else `Content` if either changed the text, else `Metadata`
//! - Anything else: `Metadata`

mod detector;
mod types;
mod validator;

pub use detector::{ConflictDetector, ConflictTypeCounts, DetectionMetrics};
pub use types::{Conflict, ConflictType};
pub use validator::{DefaultEventValidator, EventValidator};
