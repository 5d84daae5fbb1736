//! Exponential backoff.

use std::time::Duration;

/// Delay to wait after failed attempt `attempt` (1-based) before the next one.
///
/// `min × factor^(attempt-1)`, optionally capped at `max`. No jitter: retry
/// timing is deterministic.
pub fn calculate_backoff(attempt: u32, min: Duration, factor: f64, max: Option<Duration>) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = min.as_millis() as f64 * factor.powi(exponent);
    let capped_ms = match max {
        Some(max) => delay_ms.min(max.as_millis() as f64),
        None => delay_ms,
    };

    // `as` saturates, so an overflowing product becomes u64::MAX millis.
    Duration::from_millis(capped_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let min = Duration::from_millis(1000);
        assert_eq!(calculate_backoff(1, min, 2.0, None), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(2, min, 2.0, None), Duration::from_millis(2000));
        assert_eq!(calculate_backoff(3, min, 2.0, None), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_cap() {
        let min = Duration::from_millis(100);
        let max = Some(Duration::from_millis(1000));
        assert_eq!(calculate_backoff(10, min, 2.0, max), Duration::from_millis(1000));
    }

    #[test]
    fn test_attempt_zero_has_no_delay() {
        assert_eq!(calculate_backoff(0, Duration::from_secs(1), 2.0, None), Duration::ZERO);
    }

    #[test]
    fn test_huge_exponent_saturates() {
        let delay = calculate_backoff(u32::MAX, Duration::from_secs(1), 2.0, None);
        assert_eq!(delay, Duration::from_millis(u64::MAX));
    }
}
