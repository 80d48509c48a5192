//! The retry decision for a failed attempt.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use crate::attempt::{panic_message, AttemptFailure};
use crate::error::FetchError;
use crate::transport::{Response, TransportError};

use super::policy::RetryPolicy;

/// What the attempt loop should do after a failed attempt.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    Retry(Duration),
    /// Give up with this error.
    Stop(FetchError),
}

impl RetryDecision {
    /// Returns true for [`RetryDecision::Retry`].
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry(_))
    }
}

/// Decide whether attempt `attempt` (0-indexed) should be followed by a retry.
///
/// `prior` is the most recent non-success response seen earlier in the same
/// fetch; it lets the predicate weigh in on timeouts and transport failures.
/// `timeout` is only used to describe a terminal timeout.
///
/// This function is pure apart from calling the policy's predicate. It never
/// sleeps. A panicking predicate stops the fetch with
/// [`TransportError::Panicked`].
///
/// # Examples
///
/// ```rust
/// use robust_fetch::attempt::AttemptFailure;
/// use robust_fetch::retry::{decide, RetryDecision};
/// use robust_fetch::{FetchErrorKind, Response, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::linear(2, Duration::from_millis(50));
/// let failure = AttemptFailure::NonSuccess(Response::new(503, ""));
///
/// // Budget left: retry after the linear delay.
/// let first = decide(&failure, 0, &policy, None, Duration::from_secs(1));
/// assert!(matches!(first, RetryDecision::Retry(d) if d == Duration::from_millis(50)));
///
/// // Final permitted attempt: stop.
/// match decide(&failure, 2, &policy, None, Duration::from_secs(1)) {
///     RetryDecision::Stop(err) => {
///         assert_eq!(err.kind(), FetchErrorKind::RetriesExhausted);
///         assert_eq!(err.attempts(), Some(3));
///     }
///     RetryDecision::Retry(_) => unreachable!(),
/// }
/// ```
pub fn decide(
    failure: &AttemptFailure,
    attempt: u32,
    policy: &RetryPolicy,
    prior: Option<&Response>,
    timeout: Duration,
) -> RetryDecision {
    let made = attempt.saturating_add(1);

    if let AttemptFailure::ExternallyCancelled = failure {
        return RetryDecision::Stop(FetchError::ExternalCancellation { attempts: made });
    }

    let stop = || RetryDecision::Stop(terminal_error(failure, made, timeout));

    // The budget is absolute; the predicate cannot extend it.
    if attempt >= policy.attempts() {
        return stop();
    }

    let consulted = match failure {
        AttemptFailure::NonSuccess(response) => Some(response),
        _ => prior,
    };

    if let (Some(predicate), Some(response)) = (policy.should_retry(), consulted) {
        match catch_unwind(AssertUnwindSafe(|| predicate(response, attempt))) {
            Ok(true) => {}
            Ok(false) => return stop(),
            Err(panic) => {
                return RetryDecision::Stop(FetchError::Transport {
                    source: TransportError::Panicked(panic_message(panic.as_ref())),
                    attempts: made,
                })
            }
        }
    }

    RetryDecision::Retry(policy.delay_with_jitter(attempt))
}

fn terminal_error(failure: &AttemptFailure, attempts: u32, timeout: Duration) -> FetchError {
    match failure {
        AttemptFailure::NonSuccess(response) => FetchError::RetriesExhausted {
            attempts,
            last_response: Some(response.clone()),
        },
        AttemptFailure::TimedOut => FetchError::TimeoutExceeded { timeout, attempts },
        AttemptFailure::Transport(source) => FetchError::Transport {
            source: source.clone(),
            attempts,
        },
        AttemptFailure::ExternallyCancelled => FetchError::ExternalCancellation { attempts },
    }
}
