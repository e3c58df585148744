//! Retry policy: decides redelivery delays for the local emulator.

use std::time::Duration;

/// Exponential backoff with an upper bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier.
    pub multiplier: f64,

    /// No delay is ever longer than this.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after `failures` failed deliveries (1-indexed).
    ///
    /// delay = min(base_delay * multiplier^(failures - 1), max_delay)
    ///
    /// With base_delay=1s, multiplier=2.0, max_delay=60s:
    /// - failure 1: 1s
    /// - failure 2: 2s
    /// - failure 3: 4s
    /// - failure 8: 60s (capped)
    pub fn next_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 4)]
    #[case(6, 32)]
    #[case(7, 60)]
    #[case(u32::MAX, 60)]
    fn exponential_backoff_is_capped(#[case] failures: u32, #[case] expected_secs: u64) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(failures), Duration::from_secs(expected_secs));
    }

    #[test]
    fn flat_policy_never_grows() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(50),
            multiplier: 1.0,
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.next_delay(10), Duration::from_millis(50));
    }
}
