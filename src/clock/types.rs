//! Logical clock types
//!
//! A `LogicalClock` maps device identifiers to counters. Devices that are
//! absent from the map implicitly sit at zero, so `{A:1}` and `{A:1, B:0}`
//! describe the same point in causal history.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of distinct devices a clock may track
pub const MAX_DEVICES: usize = 100;

/// Per-device logical clock (vector clock)
///
/// Values are immutable from the outside: every operation in
/// [`ClockManager`](super::ClockManager) returns a new clock.
/// Serializes as a flat `{ "deviceId": counter }` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalClock {
    counters: BTreeMap<String, u64>,
}

/// Causal relationship between two clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockOrdering {
    /// Left clock happened before the right one
    Before,
    /// Left clock happened after the right one
    After,
    /// Neither dominates the other
    Concurrent,
    /// Same point in causal history
    Equal,
}

impl LogicalClock {
    /// Create an empty clock (every device at zero)
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for a device, zero if absent
    pub fn get(&self, device_id: &str) -> u64 {
        self.counters.get(device_id).copied().unwrap_or(0)
    }

    /// Devices with an explicit entry, in sorted order
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(String::as_str)
    }

    /// Explicit entries, in device order
    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of explicit device entries
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// True when no device has advanced past zero
    pub fn is_empty(&self) -> bool {
        self.counters.values().all(|&c| c == 0)
    }

    /// Raw relation without validation; see `ClockManager::compare`
    pub(crate) fn relation(&self, other: &Self) -> ClockOrdering {
        let mut before = false;
        let mut after = false;

        for device in self.counters.keys().chain(other.counters.keys()) {
            match self.get(device).cmp(&other.get(device)) {
                Ordering::Less => before = true,
                Ordering::Greater => after = true,
                Ordering::Equal => {}
            }
            if before && after {
                return ClockOrdering::Concurrent;
            }
        }

        match (before, after) {
            (false, false) => ClockOrdering::Equal,
            (true, false) => ClockOrdering::Before,
            (false, true) => ClockOrdering::After,
            (true, true) => ClockOrdering::Concurrent,
        }
    }

    pub(crate) fn with_counter(&self, device_id: &str, counter: u64) -> Self {
        let mut counters = self.counters.clone();
        counters.insert(device_id.to_string(), counter);
        Self { counters }
    }

    pub(crate) fn pointwise_max(&self, other: &Self) -> Self {
        let mut counters = self.counters.clone();
        for (device, &value) in &other.counters {
            let entry = counters.entry(device.clone()).or_insert(0);
            *entry = (*entry).max(value);
        }
        Self { counters }
    }
}

impl From<BTreeMap<String, u64>> for LogicalClock {
    fn from(counters: BTreeMap<String, u64>) -> Self {
        Self { counters }
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for LogicalClock {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self {
            counters: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl PartialEq for LogicalClock {
    fn eq(&self, other: &Self) -> bool {
        self.relation(other) == ClockOrdering::Equal
    }
}

impl Eq for LogicalClock {}

impl PartialOrd for LogicalClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.relation(other) {
            ClockOrdering::Before => Some(Ordering::Less),
            ClockOrdering::After => Some(Ordering::Greater),
            ClockOrdering::Equal => Some(Ordering::Equal),
            ClockOrdering::Concurrent => None,
        }
    }
}

impl fmt::Display for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (device, counter)) in self.counters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", device, counter)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for ClockOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClockOrdering::Before => "before",
            ClockOrdering::After => "after",
            ClockOrdering::Concurrent => "concurrent",
            ClockOrdering::Equal => "equal",
        };
        f.write_str(s)
    }
}

/// Build a clock from `(device, counter)` pairs
///
/// ```
/// use amnesia_sync::clock;
///
/// let c = clock!("A" => 2, "B" => 1);
/// assert_eq!(c.get("B"), 1);
/// ```
#[macro_export]
macro_rules! clock {
    () => { $crate::clock::LogicalClock::new() };
    ($($device:expr => $counter:expr),+ $(,)?) => {
        [$(($device, $counter as u64)),+]
            .into_iter()
            .collect::<$crate::clock::LogicalClock>()
    };
}
