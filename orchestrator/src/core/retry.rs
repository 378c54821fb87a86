//! Bounded exponential-backoff retry with an injectable sleeper.
//!
//! The sleeper seam exists so tests can run the full retry loop without
//! wall-clock waits and assert the exact backoff sequence.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Blocking delay between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
pub struct WallClockSleeper;

impl Sleeper for WallClockSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry parameters: total tries are hard-capped at `max_attempts`; the
/// sleep before retry `k` is `2^(k-1)` backoff units, with no jitter. The
/// backoff factor saturates at `u32::MAX` for very large attempt counts,
/// pinning the delay instead of wrapping it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Every attempt failed. Carries the last attempt's error, which the caller
/// records as the final failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{last_error}")]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: String,
}

/// Run `operation` until it succeeds or the attempt cap is reached.
///
/// Attempts are 1-indexed; the attempt number is passed to the operation.
/// Retries are strictly sequential: the backoff sleep blocks between
/// attempts, and nothing runs concurrently with the operation.
pub fn run_with_retry<T, S, F>(
    policy: &RetryPolicy,
    sleeper: &S,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    S: Sleeper,
    F: FnMut(u32) -> Result<T, String>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let delay = policy
                .backoff_unit
                .saturating_mul(2u32.saturating_pow(attempt - 2));
            warn!(attempt, ?delay, "retrying after backoff");
            sleeper.sleep(delay);
        }
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(error) => last_error = error,
        }
    }

    Err(RetryExhausted {
        attempts: max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSleeper;
    use std::cell::Cell;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_unit: Duration::from_secs(1),
        }
    }

    #[test]
    fn first_success_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let result = run_with_retry(&policy(3), &sleeper, |_| Ok::<_, String>(42));

        assert_eq!(result, Ok(42));
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn always_failing_operation_runs_exactly_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);

        let err = run_with_retry(&policy(3), &sleeper, |attempt| {
            calls.set(calls.get() + 1);
            Err::<(), _>(format!("attempt {attempt} failed"))
        })
        .expect_err("should exhaust");

        assert_eq!(calls.get(), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "attempt 3 failed");
        assert_eq!(
            sleeper.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn backoff_doubles_across_a_four_attempt_cap() {
        let sleeper = RecordingSleeper::default();
        let _ = run_with_retry(&policy(4), &sleeper, |_| Err::<(), _>("nope".to_string()));

        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn large_attempt_cap_saturates_the_delay_instead_of_wrapping() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);

        let err = run_with_retry(&policy(40), &sleeper, |_| {
            calls.set(calls.get() + 1);
            Err::<(), _>("no".to_string())
        })
        .expect_err("should exhaust");

        assert_eq!(calls.get(), 40);
        assert_eq!(err.attempts, 40);
        let sleeps = sleeper.sleeps();
        assert_eq!(sleeps.len(), 39);
        // Past the width of the backoff factor the delay pins at the
        // maximum; it never wraps back down.
        assert_eq!(sleeps[38], Duration::from_secs(u64::from(u32::MAX)));
        assert!(sleeps.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn stops_at_first_success() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);

        let result = run_with_retry(&policy(5), &sleeper, |attempt| {
            calls.set(calls.get() + 1);
            if attempt < 3 {
                Err("not yet".to_string())
            } else {
                Ok(attempt)
            }
        });

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
        assert_eq!(
            sleeper.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn zero_attempt_cap_still_tries_once() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0u32);
        let _ = run_with_retry(&policy(0), &sleeper, |_| {
            calls.set(calls.get() + 1);
            Err::<(), _>("no".to_string())
        });
        assert_eq!(calls.get(), 1);
    }
}
