//! # Backoff policy for reconnecting closed streams.
//!
//! [`BackoffPolicy`] controls how long the manager waits before replacing a stream
//! that the transport reported as closed. It is parameterized by:
//! - [`BackoffPolicy::base`] the delay unit for attempt `0`;
//! - [`BackoffPolicy::max_attempt`] the attempt index after which growth stops;
//! - [`BackoffPolicy::jitter`] the randomization applied to the capped ceiling.
//!
//! The ceiling for attempt `n` is `base × 2^min(n, max_attempt)`. Jitter is applied
//! **after** capping, so with the default full jitter the delay is uniformly drawn
//! from `[0, ceiling)` and never exceeds `base × 2^max_attempt`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use ssevisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     base: Duration::from_millis(500),
//!     max_attempt: 7,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay(0), Duration::from_millis(500));
//! assert_eq!(backoff.delay(3), Duration::from_millis(4_000));
//! // Attempts past the cap reuse the attempt-7 ceiling.
//! assert_eq!(backoff.delay(42), Duration::from_millis(64_000));
//! assert_eq!(backoff.next_attempt(7), 7);
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Attempt index at which the exponential growth stops.
pub const MAX_ATTEMPT: u32 = 7;

/// Delay unit for the first retry.
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Reconnect backoff policy.
///
/// Stateless: the attempt counter lives on the connection being replaced and is
/// passed in on every call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay unit for attempt `0`.
    pub base: Duration,
    /// Attempts above this value do not raise the ceiling any further.
    pub max_attempt: u32,
    /// Randomization applied to the capped ceiling.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `base = 500ms`;
    /// - `max_attempt = 7` (ceiling tops out at 64s);
    /// - `jitter = Full`.
    fn default() -> Self {
        Self {
            base: BASE_DELAY,
            max_attempt: MAX_ATTEMPT,
            jitter: JitterPolicy::Full,
        }
    }
}

impl BackoffPolicy {
    /// Deterministic upper bound for the given attempt: `base × 2^min(attempt, max_attempt)`.
    ///
    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.min(self.max_attempt).min(31);
        self.base.saturating_mul(1u32 << exp)
    }

    /// Computes the randomized delay before retrying after `attempt` failures.
    ///
    /// `attempt = 0` is the first retry. The result is never negative and never
    /// larger than [`BackoffPolicy::max_delay`].
    pub fn delay(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.ceiling(attempt))
    }

    /// Attempt index carried by the replacement connection.
    #[inline]
    pub fn next_attempt(&self, attempt: u32) -> u32 {
        attempt.saturating_add(1).min(self.max_attempt)
    }

    /// Largest ceiling this policy can produce.
    #[inline]
    pub fn max_delay(&self) -> Duration {
        self.ceiling(self.max_attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> BackoffPolicy {
        BackoffPolicy {
            jitter: JitterPolicy::None,
            ..BackoffPolicy::default()
        }
    }

    #[test]
    fn test_attempt_zero_uses_base() {
        assert_eq!(fixed().delay(0), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let policy = fixed();
        assert_eq!(policy.delay(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay(4), Duration::from_millis(8_000));
        assert_eq!(policy.delay(7), Duration::from_millis(64_000));
    }

    #[test]
    fn test_cap_stops_growth() {
        let policy = fixed();
        for attempt in 7..64 {
            assert_eq!(policy.delay(attempt), Duration::from_millis(64_000));
        }
        assert_eq!(policy.delay(u32::MAX), policy.max_delay());
    }

    #[test]
    fn test_next_attempt_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next_attempt(0), 1);
        assert_eq!(policy.next_attempt(6), 7);
        assert_eq!(policy.next_attempt(7), 7);
        assert_eq!(policy.next_attempt(u32::MAX), 7);
    }

    #[test]
    fn test_full_jitter_bounds() {
        let policy = BackoffPolicy::default();
        let cap = Duration::from_millis(500 * 128);
        for attempt in 0..12 {
            let ceiling = policy.ceiling(attempt);
            for _ in 0..200 {
                let delay = policy.delay(attempt);
                assert!(delay < ceiling, "attempt {attempt}: {delay:?} >= {ceiling:?}");
                assert!(delay < cap, "attempt {attempt}: {delay:?} escaped the cap");
            }
        }
    }

    #[test]
    fn test_first_retry_within_half_second() {
        let policy = BackoffPolicy::default();
        for _ in 0..1_000 {
            assert!(policy.delay(0) < Duration::from_millis(500));
        }
    }

    #[test]
    fn test_mean_delay_non_decreasing_up_to_cap() {
        let policy = BackoffPolicy::default();
        let samples = 400;
        let mean = |attempt: u32| {
            let total: Duration = (0..samples).map(|_| policy.delay(attempt)).sum();
            total / samples
        };

        let mut prev = Duration::ZERO;
        for attempt in 0..=MAX_ATTEMPT {
            let current = mean(attempt);
            // expectation doubles per step; the sampled mean is far above the previous one
            assert!(
                current * 10 >= prev * 9,
                "attempt {attempt}: mean {current:?} dropped below {prev:?}"
            );
            prev = current;
        }
    }

    #[test]
    fn test_zero_base_is_zero() {
        let policy = BackoffPolicy {
            base: Duration::ZERO,
            ..BackoffPolicy::default()
        };
        assert_eq!(policy.delay(5), Duration::ZERO);
    }
}
