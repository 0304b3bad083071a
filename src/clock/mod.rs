//! Logical clocks for causality tracking
//!
//! Provides:
//! - `LogicalClock`: immutable device -> counter map
//! - `ClockManager`: create, increment, compare, merge, validate
//!
//! # Causality
//!
//! For clocks `a` and `b`, over the union of their devices:
//! - `Equal` if every counter matches
//! - `Before` if some counter in `a` is lower and none is higher
//! - `After` if some counter in `a` is higher and none is lower
//! - `Concurrent` otherwise

mod manager;
mod types;

pub use manager::{is_valid_device_id, ClockManager};
pub use types::{ClockOrdering, LogicalClock, MAX_DEVICES};
