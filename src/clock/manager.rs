//! Clock manager
//!
//! Causality comparison and combination over logical clocks. Pure functions,
//! no shared state. Every operation validates its operands before computing
//! anything, so causality is never derived from malformed input.

use serde_json::Value;

use super::types::{ClockOrdering, LogicalClock, MAX_DEVICES};
use crate::error::{Result, SyncError};

/// Stateless operations over [`LogicalClock`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockManager;

impl ClockManager {
    /// Create a clock that has seen one event from `device_id`
    pub fn create(device_id: &str) -> Result<LogicalClock> {
        validate_device_id(device_id)?;
        Ok(LogicalClock::new().with_counter(device_id, 1))
    }

    /// Return a copy of `clock` with `device_id` advanced by one
    pub fn increment(clock: &LogicalClock, device_id: &str) -> Result<LogicalClock> {
        Self::validate(clock)?;
        validate_device_id(device_id)?;

        if clock.len() >= MAX_DEVICES && clock.get(device_id) == 0 {
            return Err(SyncError::InvalidVectorClock(format!(
                "adding device {} would exceed {} devices",
                device_id, MAX_DEVICES
            )));
        }

        let next = clock.get(device_id).checked_add(1).ok_or_else(|| {
            SyncError::InvalidVectorClock(format!("counter for {} overflowed", device_id))
        })?;

        Ok(clock.with_counter(device_id, next))
    }

    /// Causal relationship of `a` relative to `b`
    pub fn compare(a: &LogicalClock, b: &LogicalClock) -> Result<ClockOrdering> {
        Self::validate(a)?;
        Self::validate(b)?;
        Ok(a.relation(b))
    }

    /// Pointwise maximum of both clocks
    pub fn merge(a: &LogicalClock, b: &LogicalClock) -> Result<LogicalClock> {
        Self::validate(a)?;
        Self::validate(b)?;

        let merged = a.pointwise_max(b);
        if merged.len() > MAX_DEVICES {
            return Err(SyncError::InvalidVectorClock(format!(
                "merged clock tracks {} devices (max {})",
                merged.len(),
                MAX_DEVICES
            )));
        }
        Ok(merged)
    }

    /// Check structural validity, returning the first problem found
    pub fn validate(clock: &LogicalClock) -> Result<()> {
        if clock.len() > MAX_DEVICES {
            return Err(SyncError::InvalidVectorClock(format!(
                "clock tracks {} devices (max {})",
                clock.len(),
                MAX_DEVICES
            )));
        }

        for device in clock.devices() {
            if !is_valid_device_id(device) {
                return Err(SyncError::InvalidVectorClock(format!(
                    "invalid device id {:?}",
                    device
                )));
            }
        }

        Ok(())
    }

    pub fn is_valid(clock: &LogicalClock) -> bool {
        Self::validate(clock).is_ok()
    }

    /// Parse a clock from its wire JSON form
    ///
    /// Rejects anything that is not a flat object of non-negative integer
    /// counters, then applies the same checks as [`ClockManager::validate`].
    pub fn from_json(value: &Value) -> Result<LogicalClock> {
        let map = value.as_object().ok_or_else(|| {
            SyncError::InvalidVectorClock(format!("expected an object, got {}", json_kind(value)))
        })?;

        let mut clock = LogicalClock::new();
        for (device, counter) in map {
            let counter = counter.as_u64().ok_or_else(|| {
                SyncError::InvalidVectorClock(format!(
                    "counter for {:?} must be a non-negative integer, got {}",
                    device, counter
                ))
            })?;
            clock = clock.with_counter(device, counter);
        }

        Self::validate(&clock)?;
        Ok(clock)
    }

    /// Devices with an explicit entry, sorted
    pub fn get_devices(clock: &LogicalClock) -> Vec<String> {
        clock.devices().map(str::to_string).collect()
    }

    pub fn get_counter(clock: &LogicalClock, device_id: &str) -> u64 {
        clock.get(device_id)
    }

    pub fn is_empty(clock: &LogicalClock) -> bool {
        clock.is_empty()
    }

    pub fn to_string(clock: &LogicalClock) -> String {
        clock.to_string()
    }
}

/// Device ids are non-empty, not all whitespace, and free of control characters
pub fn is_valid_device_id(device_id: &str) -> bool {
    !device_id.trim().is_empty() && !device_id.chars().any(char::is_control)
}

fn validate_device_id(device_id: &str) -> Result<()> {
    if is_valid_device_id(device_id) {
        Ok(())
    } else {
        Err(SyncError::InvalidDeviceId(device_id.to_string()))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
