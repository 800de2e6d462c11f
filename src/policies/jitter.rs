//! # Jitter policy for reconnect delays.
//!
//! [`JitterPolicy`] spreads reconnects of many streams that failed together
//! (server restart, network blip) so they do not hit the server in lockstep.
//!
//! - [`JitterPolicy::None`]: no randomization, the delay is the ceiling itself
//! - [`JitterPolicy::Full`]: uniform in `[0, ceiling)`
//! - [`JitterPolicy::Equal`]: `ceiling/2 + uniform[0, ceiling/2)`

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of reconnect delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact ceiling. Useful for tests and single-stream deployments.
    None,

    /// Uniform delay in `[0, ceiling)`.
    #[default]
    Full,

    /// Half the ceiling plus a uniform share of the other half.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given ceiling.
    ///
    /// Randomized results are strictly below a non-zero ceiling.
    pub fn apply(&self, ceiling: Duration) -> Duration {
        match self {
            JitterPolicy::None => ceiling,
            JitterPolicy::Full => full_jitter(ceiling),
            JitterPolicy::Equal => equal_jitter(ceiling),
        }
    }
}

/// Full jitter: random[0, delay)
fn full_jitter(delay: Duration) -> Duration {
    let nanos = as_nanos(delay);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}

/// Equal jitter: delay/2 + random[0, delay/2)
fn equal_jitter(delay: Duration) -> Duration {
    let nanos = as_nanos(delay);
    let half = nanos / 2;
    let rest = nanos - half;
    if rest == 0 {
        return Duration::from_nanos(half);
    }
    Duration::from_nanos(half + rand::rng().random_range(0..rest))
}

fn as_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let d = Duration::from_millis(1234);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn test_full_stays_below_ceiling() {
        let d = Duration::from_millis(500);
        for _ in 0..1_000 {
            assert!(JitterPolicy::Full.apply(d) < d);
        }
    }

    #[test]
    fn test_equal_stays_in_upper_half() {
        let d = Duration::from_millis(1_000);
        for _ in 0..1_000 {
            let j = JitterPolicy::Equal.apply(d);
            assert!(j >= Duration::from_millis(500));
            assert!(j < d);
        }
    }

    #[test]
    fn test_zero_ceiling() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
