//! Retry policy
//!
//! A pure function of the item's failure history and the error class; the
//! engine applies whatever it returns.

use crate::config::RetryConfig;
use clinic_core::{ErrorKind, RemoteError};
use std::time::Duration;

/// What to do with an item after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Back to `pending`, not attempted again before `delay` has passed
    Retry { delay: Duration },
    /// Terminal failure
    Fail(ErrorKind),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff after the `failures`-th consecutive failure:
    /// `min(base * 2^(failures - 1), max)`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Decide the fate of an item that has already failed `prior_failures`
    /// times in a row and just failed again with `error`.
    pub fn decide(&self, prior_failures: u32, error: &RemoteError) -> Disposition {
        if !error.is_transient() {
            return Disposition::Fail(ErrorKind::RequestRejected);
        }

        let failures = prior_failures.saturating_add(1);
        if failures >= self.max_retries {
            Disposition::Fail(ErrorKind::RetriesExhausted)
        } else {
            Disposition::Retry {
                delay: self.delay_for(failures),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> RemoteError {
        RemoteError::Network("connection reset".into())
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(2), Duration::from_secs(60));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(6), Duration::from_secs(60));
        assert_eq!(policy.delay_for(200), Duration::from_secs(60));
    }

    #[test]
    fn test_delays_never_decrease() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=40).map(|n| policy.delay_for(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_cap_of_three_fails_on_third_failure() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));

        assert!(matches!(policy.decide(0, &network()), Disposition::Retry { .. }));
        assert!(matches!(policy.decide(1, &network()), Disposition::Retry { .. }));
        assert_eq!(
            policy.decide(2, &network()),
            Disposition::Fail(ErrorKind::RetriesExhausted)
        );
    }

    #[test]
    fn test_rejection_is_terminal_immediately() {
        let policy = RetryPolicy::default();
        let rejected = RemoteError::Rejected {
            status: 409,
            message: "conflict".into(),
        };
        assert_eq!(
            policy.decide(0, &rejected),
            Disposition::Fail(ErrorKind::RequestRejected)
        );
    }

    #[test]
    fn test_timeouts_and_server_errors_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(0, &RemoteError::Timeout(30_000)),
            Disposition::Retry {
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            policy.decide(
                1,
                &RemoteError::Server {
                    status: 503,
                    message: String::new()
                }
            ),
            Disposition::Retry {
                delay: Duration::from_secs(4)
            }
        );
    }
}
