//! The terminal error of a fetch.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::schema::Issues;
use crate::transport::{Response, TransportError};

/// Result of a fetch: exactly one of a value or a [`FetchError`].
pub type FetchResult<T> = Result<T, FetchError>;

/// Why a fetch failed.
///
/// A closed set of variants, each constructed at the site that detected the
/// failure. Every variant carries enough context (attempt count, last
/// response, issue list) to diagnose the failure without re-running the call.
///
/// # Examples
///
/// ```rust
/// use robust_fetch::{FetchError, FetchErrorKind, Response};
///
/// let err = FetchError::RetriesExhausted {
///     attempts: 3,
///     last_response: Some(Response::new(503, "busy")),
/// };
///
/// assert_eq!(err.kind(), FetchErrorKind::RetriesExhausted);
/// assert_eq!(err.attempts(), Some(3));
/// assert_eq!(err.last_response().map(|r| r.status()), Some(503));
/// assert_eq!(err.to_string(), "retries exhausted after 3 attempts (last status 503)");
/// ```
#[derive(Debug, Clone)]
pub enum FetchError {
    /// The per-attempt deadline fired before the transport settled.
    TimeoutExceeded {
        /// The deadline that was exceeded.
        timeout: Duration,
        /// Attempts made, including the one that timed out.
        attempts: u32,
    },
    /// No attempt succeeded and no further retry is allowed.
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// The last non-success response seen, if any.
        last_response: Option<Response>,
    },
    /// The schema rejected the response body.
    ValidationRejected {
        /// The schema's issues, verbatim and in order.
        issues: Issues,
    },
    /// The caller's own cancellation handle fired.
    ExternalCancellation {
        /// Attempts that reached the transport before cancellation.
        attempts: u32,
    },
    /// The transport failed, or the body could not be parsed.
    Transport {
        /// The original cause.
        source: TransportError,
        /// Attempts made, including the failing one.
        attempts: u32,
    },
    /// The retry policy violates an invariant; no attempt was made.
    InvalidPolicy(&'static str),
}

/// The tag of a [`FetchError`], for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// See [`FetchError::TimeoutExceeded`].
    TimeoutExceeded,
    /// See [`FetchError::RetriesExhausted`].
    RetriesExhausted,
    /// See [`FetchError::ValidationRejected`].
    ValidationRejected,
    /// See [`FetchError::ExternalCancellation`].
    ExternalCancellation,
    /// See [`FetchError::Transport`].
    Transport,
    /// See [`FetchError::InvalidPolicy`].
    InvalidPolicy,
}

impl FetchError {
    /// The variant tag.
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::TimeoutExceeded { .. } => FetchErrorKind::TimeoutExceeded,
            Self::RetriesExhausted { .. } => FetchErrorKind::RetriesExhausted,
            Self::ValidationRejected { .. } => FetchErrorKind::ValidationRejected,
            Self::ExternalCancellation { .. } => FetchErrorKind::ExternalCancellation,
            Self::Transport { .. } => FetchErrorKind::Transport,
            Self::InvalidPolicy(_) => FetchErrorKind::InvalidPolicy,
        }
    }

    /// Number of attempts made, where the variant records it.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::TimeoutExceeded { attempts, .. }
            | Self::RetriesExhausted { attempts, .. }
            | Self::ExternalCancellation { attempts }
            | Self::Transport { attempts, .. } => Some(*attempts),
            Self::ValidationRejected { .. } | Self::InvalidPolicy(_) => None,
        }
    }

    /// The last non-success response, for [`FetchError::RetriesExhausted`].
    pub fn last_response(&self) -> Option<&Response> {
        match self {
            Self::RetriesExhausted { last_response, .. } => last_response.as_ref(),
            _ => None,
        }
    }

    /// The schema issues, for [`FetchError::ValidationRejected`].
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            Self::ValidationRejected { issues } => Some(issues),
            _ => None,
        }
    }

    /// Returns true if the caller's cancellation handle ended the fetch.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::ExternalCancellation { .. })
    }

    /// Returns true if an attempt deadline ended the fetch.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimeoutExceeded { .. })
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeoutExceeded { timeout, attempts } => write!(
                f,
                "request timed out after {:?} (attempt {})",
                timeout, attempts
            ),
            Self::RetriesExhausted {
                attempts,
                last_response: Some(response),
            } => write!(
                f,
                "retries exhausted after {} attempts (last status {})",
                attempts,
                response.status()
            ),
            Self::RetriesExhausted {
                attempts,
                last_response: None,
            } => write!(f, "retries exhausted after {} attempts", attempts),
            Self::ValidationRejected { issues } => {
                write!(f, "response failed validation: {}", issues)
            }
            Self::ExternalCancellation { attempts } => {
                write!(f, "request cancelled by caller after {} attempts", attempts)
            }
            Self::Transport { source, attempts } => {
                write!(f, "transport failure on attempt {}: {}", attempts, source)
            }
            Self::InvalidPolicy(reason) => write!(f, "invalid retry policy: {}", reason),
        }
    }
}

impl StdError for FetchError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
