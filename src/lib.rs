//! Amnesia Sync Library
//!
//! Causality tracking and conflict handling for multi-device highlight sync.
//! The `amnesia-sync` binary in main.rs reconciles two event batch files.
//!
//! # Modules
//!
//! - `clock`: Vector clocks and the `ClockManager` operations on them
//! - `events`: Sync events and their typed payloads
//! - `conflict`: Detection and classification of concurrent edits
//! - `resolve`: Resolution strategies and the `ConflictResolver`
//! - `notify`: Outbound notifications for resolved conflicts
//! - `session`: Detect-then-resolve orchestration over two batches

pub mod clock;
pub mod config;
pub mod conflict;
pub mod error;
pub mod events;
pub mod notify;
pub mod resolve;
pub mod session;

mod metrics;

pub use clock::{ClockManager, ClockOrdering, LogicalClock};
pub use config::SyncConfig;
pub use conflict::{Conflict, ConflictDetector, ConflictType};
pub use error::{Result, SyncError};
pub use events::{EventPayload, EventType, SyncEvent};
pub use resolve::{ConflictResolver, ResolutionResult, ResolutionStrategy};
pub use session::{SyncReport, SyncSession};
