//! The attempt loop and the public entry points.
//!
//! A fetch moves through these states:
//!
//! ```text
//! Init ──> Attempting ──> SuccessTerminal ──> (validate) ──> Ok
//!              │  ^
//!              v  │
//!            Retrying ──> FailureTerminal ──> Err
//! ```
//!
//! `Init` rejects an invalid policy before any transport call. Each pass
//! through `Attempting` composes a fresh [`AttemptScope`], runs one transport
//! call and hands any failure to [`decide`]. `Retrying` waits out the delay
//! unless the caller cancels first.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::attempt::{execute_attempt, panic_message, AttemptFailure};
use crate::cancel::{cancellable_sleep, AttemptScope, Wait};
use crate::error::{FetchError, FetchResult};
use crate::retry::{decide, RetryDecision, RetryEvent, RetryPolicy};
use crate::schema::{validate_response, Schema, SchemaError};
use crate::transport::{Request, Response, Transport, TransportError};

/// Default per-attempt deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback invoked before every retry wait.
pub type RetryHook = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Per-call settings for [`robust_fetch`] and [`robust_fetch_validated`].
///
/// # Examples
///
/// ```rust
/// use robust_fetch::{FetchOptions, RetryPolicy};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// let shutdown = CancellationToken::new();
/// let options = FetchOptions::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_retry(RetryPolicy::exponential(3, Duration::from_millis(200)))
///     .with_cancellation(shutdown.clone())
///     .on_retry(|event| eprintln!("attempt {} failed, waiting {:?}", event.attempt, event.next_delay));
///
/// assert_eq!(options.timeout(), Duration::from_secs(5));
/// assert_eq!(options.retry().attempts(), 3);
/// ```
#[derive(Clone)]
pub struct FetchOptions {
    timeout: Duration,
    retry: RetryPolicy,
    cancellation: Option<CancellationToken>,
    on_retry: Option<RetryHook>,
}

impl FetchOptions {
    /// A 30 second deadline, no retries, no cancellation handle.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::none(),
            cancellation: None,
            on_retry: None,
        }
    }

    /// Set the per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Attach the caller's cancellation handle.
    ///
    /// The fetch only ever observes this token; it never cancels it.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Install a hook called before every retry wait.
    ///
    /// The hook is synchronous and should not block; use it for logging and
    /// metrics. A panic in the hook is not caught.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// The per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The retry policy.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The caller's cancellation handle, if any.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    fn notify_retry(&self, event: &RetryEvent<'_>) {
        if let Some(hook) = &self.on_retry {
            hook(event);
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("cancellation", &self.cancellation)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

/// Loop state threaded through the attempts of one fetch.
struct AttemptState {
    attempt: u32,
    last_response: Option<Response>,
    started: Instant,
}

impl AttemptState {
    fn new() -> Self {
        Self {
            attempt: 0,
            last_response: None,
            started: Instant::now(),
        }
    }

    fn made(&self) -> u32 {
        self.attempt.saturating_add(1)
    }
}

/// Perform `request` with timeouts, cancellation and retries.
///
/// Returns the first 2xx response, or the [`FetchError`] that ended the
/// fetch. Never panics: a panicking transport is reported as
/// [`TransportError::Panicked`].
///
/// # Examples
///
/// ```rust
/// use robust_fetch::testing::{ScriptedTransport, Step};
/// use robust_fetch::{robust_fetch, FetchErrorKind, FetchOptions, RetryPolicy};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::repeating(Step::status(503));
/// let options = FetchOptions::new().with_retry(RetryPolicy::linear(2, Duration::from_millis(1)));
///
/// let err = robust_fetch(&transport, "https://api.example.test/items", &options)
///     .await
///     .unwrap_err();
///
/// assert_eq!(err.kind(), FetchErrorKind::RetriesExhausted);
/// assert_eq!(err.attempts(), Some(3));
/// assert_eq!(transport.calls(), 3);
/// # });
/// ```
pub async fn robust_fetch<T>(
    transport: &T,
    request: impl Into<Request>,
    options: &FetchOptions,
) -> FetchResult<Response>
where
    T: Transport + ?Sized,
{
    let request = request.into();
    let span = tracing::debug_span!("robust_fetch", method = %request.method(), url = %request.url());

    run_attempts(transport, &request, options)
        .instrument(span)
        .await
        .map(|(response, _)| response)
}

/// Like [`robust_fetch`], then parse the body as JSON and validate it.
///
/// Validation runs once, on the successful response, and is never retried.
/// The returned response keeps the original status and headers with the
/// validated value as its body.
///
/// # Examples
///
/// ```rust
/// use robust_fetch::schema::{self, Validation, ValidationIssue};
/// use robust_fetch::testing::{ScriptedTransport, Step};
/// use robust_fetch::{robust_fetch_validated, FetchOptions};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new([Step::json(200, &json!({"age": -1}))]);
/// let adult = schema::from_fn(|value: serde_json::Value| match value["age"].as_i64() {
///     Some(age) if age >= 0 => Validation::valid(age),
///     _ => Validation::invalid(ValidationIssue::new("must be non-negative").at(["age"])),
/// });
///
/// let err = robust_fetch_validated(&transport, "/me", &FetchOptions::new(), &adult)
///     .await
///     .unwrap_err();
///
/// assert_eq!(err.to_string(), "response failed validation: age: must be non-negative");
/// # });
/// ```
pub async fn robust_fetch_validated<T, S>(
    transport: &T,
    request: impl Into<Request>,
    options: &FetchOptions,
    schema: &S,
) -> FetchResult<Response<S::Output>>
where
    T: Transport + ?Sized,
    S: Schema + ?Sized,
{
    let request = request.into();
    let span = tracing::debug_span!("robust_fetch", method = %request.method(), url = %request.url());

    async {
        let (response, attempts) = run_attempts(transport, &request, options).await?;
        validate(response, attempts, schema).await
    }
    .instrument(span)
    .await
}

async fn run_attempts<T>(
    transport: &T,
    request: &Request,
    options: &FetchOptions,
) -> FetchResult<(Response, u32)>
where
    T: Transport + ?Sized,
{
    let policy = options.retry();
    policy.validate().map_err(FetchError::InvalidPolicy)?;

    let external = options.cancellation();
    let mut state = AttemptState::new();

    while state.attempt <= policy.attempts() {
        if external.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(attempts = state.attempt, "cancelled before attempt");
            return Err(FetchError::ExternalCancellation {
                attempts: state.attempt,
            });
        }

        tracing::debug!(attempt = state.made(), "sending request");
        let scope = AttemptScope::compose(external, options.timeout());
        let outcome = execute_attempt(transport, request, &scope).await;
        drop(scope);

        let failure = match outcome.split() {
            Ok(response) => {
                tracing::debug!(
                    attempt = state.made(),
                    status = response.status(),
                    "request succeeded"
                );
                return Ok((response, state.made()));
            }
            Err(failure) => failure,
        };

        let timeout = options.timeout();
        match decide(&failure, state.attempt, policy, state.last_response.as_ref(), timeout) {
            RetryDecision::Stop(err) => {
                tracing::debug!(attempt = state.made(), error = %err, "giving up");
                return Err(err);
            }
            RetryDecision::Retry(delay) => {
                options.notify_retry(&RetryEvent {
                    attempt: state.made(),
                    failure: &failure,
                    next_delay: delay,
                    elapsed: state.started.elapsed(),
                });
                tracing::warn!(
                    attempt = state.made(),
                    reason = %failure.describe(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying request"
                );

                if let AttemptFailure::NonSuccess(response) = failure {
                    state.last_response = Some(response);
                }

                if cancellable_sleep(delay, external).await == Wait::Cancelled {
                    tracing::debug!(attempts = state.made(), "cancelled during retry delay");
                    return Err(FetchError::ExternalCancellation {
                        attempts: state.made(),
                    });
                }
                state.attempt += 1;
            }
        }
    }

    Err(FetchError::RetriesExhausted {
        attempts: state.attempt,
        last_response: state.last_response,
    })
}

async fn validate<S>(response: Response, attempts: u32, schema: &S) -> FetchResult<Response<S::Output>>
where
    S: Schema + ?Sized,
{
    tracing::debug!(status = response.status(), "validating response body");

    match AssertUnwindSafe(validate_response(response, schema))
        .catch_unwind()
        .await
    {
        Ok(Ok(validated)) => Ok(validated),
        Ok(Err(SchemaError::Malformed(cause))) => Err(FetchError::Transport {
            source: TransportError::malformed_body(cause),
            attempts,
        }),
        Ok(Err(SchemaError::Rejected(issues))) => {
            tracing::debug!(issues = issues.len(), "response rejected by schema");
            Err(FetchError::ValidationRejected { issues })
        }
        Err(panic) => Err(FetchError::Transport {
            source: TransportError::Panicked(panic_message(panic.as_ref())),
            attempts,
        }),
    }
}
