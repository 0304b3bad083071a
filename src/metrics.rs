//! Shared helpers for the detector and resolver metrics

use std::time::Duration;

/// Fold a latency sample into an exponentially weighted average
///
/// `samples` counts the new sample; the first sample seeds the average.
pub(crate) fn exponential_average(current: f64, sample: f64, samples: u64, weight: f64) -> f64 {
    if samples <= 1 {
        sample
    } else {
        current + weight * (sample - current)
    }
}

pub(crate) fn as_millis_f64(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds_average() {
        assert_eq!(exponential_average(0.0, 12.0, 1, 0.1), 12.0);
    }

    #[test]
    fn test_weighted_update() {
        let avg = exponential_average(10.0, 20.0, 2, 0.5);
        assert!((avg - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_millis() {
        assert!((as_millis_f64(Duration::from_micros(1500)) - 1.5).abs() < 1e-9);
    }
}
