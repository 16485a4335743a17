//! Retry rounds for page fetches.
//!
//! A [`RetryPolicy`] describes how many rounds the fetcher makes over its
//! candidate URLs and how long it sleeps between rounds. The default is a
//! fixed delay; [`RetryPolicy::with_backoff`] swaps in a bounded exponential
//! delay without changing the number of rounds.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mediacrawl_core::fetch::RetryPolicy;
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(5));
//! assert_eq!(policy.max_rounds(), 3);
//! assert_eq!(policy.delay_after(1), Duration::from_secs(5));
//! assert_eq!(policy.delay_after(2), Duration::from_secs(5));
//! ```

use std::time::Duration;

/// Default number of retry rounds.
pub const DEFAULT_FETCH_ROUNDS: u32 = 3;

/// Default fixed delay between rounds.
pub const DEFAULT_ROUND_DELAY: Duration = Duration::from_secs(5);

/// Bounded exponential growth of the inter-round delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Multiplier applied per completed round (2.0 doubles).
    pub multiplier: f32,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

/// How many rounds to try and how long to wait between them.
///
/// # Default Values
///
/// - `max_rounds`: 3
/// - `delay`: 5 seconds, fixed
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Number of rounds over the candidate list (at least 1).
    max_rounds: u32,

    /// Base delay slept after a failed round.
    delay: Duration,

    /// Optional exponential growth of `delay`.
    backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_FETCH_ROUNDS,
            delay: DEFAULT_ROUND_DELAY,
            backoff: None,
        }
    }
}

impl RetryPolicy {
    /// Creates a fixed-delay policy. `max_rounds` is clamped to at least 1.
    #[must_use]
    pub fn new(max_rounds: u32, delay: Duration) -> Self {
        Self {
            max_rounds: max_rounds.max(1),
            delay,
            backoff: None,
        }
    }

    /// Replaces the fixed delay with bounded exponential growth.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Returns the number of rounds.
    #[must_use]
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Delay to sleep after `round` (1-indexed) failed.
    #[must_use]
    pub fn delay_after(&self, round: u32) -> Duration {
        let Some(backoff) = self.backoff else {
            return self.delay;
        };

        let exponent = i32::try_from(round.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self
            .delay
            .as_secs_f64()
            * f64::from(backoff.multiplier).powi(exponent);
        let capped = scaled.min(backoff.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(backoff.max_delay)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_rounds(), 3);
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_policy_rounds_minimum_is_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_rounds(), 1);
    }

    #[test]
    fn test_fixed_delay_does_not_grow() {
        let policy = RetryPolicy::new(5, Duration::from_millis(250));
        for round in 1..=5 {
            assert_eq!(policy.delay_after(round), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1)).with_backoff(Backoff {
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        });
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
        assert_eq!(policy.delay_after(4), Duration::from_secs(5));
        assert_eq!(policy.delay_after(9), Duration::from_secs(5));
    }
}
