//! Testing utilities for code built on robust-fetch.
//!
//! This module provides a scripted in-memory [`Transport`] and assertion
//! macros for fetch results.
//!
//! # Examples
//!
//! ## ScriptedTransport
//!
//! ```rust
//! use robust_fetch::testing::{ScriptedTransport, Step};
//! use robust_fetch::{robust_fetch, FetchOptions, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let transport = ScriptedTransport::new([Step::status(503), Step::text(200, "ok")]);
//! let options = FetchOptions::new().with_retry(RetryPolicy::linear(2, Duration::ZERO));
//!
//! let response = robust_fetch(&transport, "https://example.test", &options).await.unwrap();
//! assert_eq!(response.body().text().unwrap(), "ok");
//! assert_eq!(transport.calls(), 2);
//! # });
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use robust_fetch::{assert_fetch_err, assert_fetch_ok, FetchError, FetchErrorKind, Response};
//!
//! let ok: Result<Response, FetchError> = Ok(Response::new(200, "fine"));
//! let response = assert_fetch_ok!(ok);
//! assert_eq!(response.status(), 200);
//!
//! let err: Result<Response, FetchError> = Err(FetchError::ExternalCancellation { attempts: 0 });
//! assert_fetch_err!(err, FetchErrorKind::ExternalCancellation);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::transport::{Body, Headers, Request, Response, Transport, TransportError};

/// One scripted transport behavior.
#[derive(Debug, Clone)]
pub enum Step {
    /// Respond with a status, headers and body.
    Respond {
        /// Status code.
        status: u16,
        /// Response headers.
        headers: Headers,
        /// Response body.
        body: Body,
    },
    /// Fail with a transport error.
    Fail(TransportError),
    /// Never settle, ignoring the signal.
    Hang,
    /// Settle with [`TransportError::Cancelled`] once the signal fires.
    CancelAware,
    /// Panic with the given message when polled.
    Panic(String),
    /// Wait, then play the inner step. The wait ends early with
    /// [`TransportError::Cancelled`] if the signal fires.
    Delayed(Duration, Box<Step>),
}

impl Step {
    /// Respond with an empty body.
    pub fn status(status: u16) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            body: Body::empty(),
        }
    }

    /// Respond with a text body.
    pub fn text(status: u16, body: &str) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            body: Body::from(body),
        }
    }

    /// Respond with a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Step::Respond {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Body::from(body),
        }
    }

    /// Fail with `error`.
    pub fn fail(error: TransportError) -> Self {
        Step::Fail(error)
    }

    /// Play this step after `delay`.
    pub fn after(self, delay: Duration) -> Self {
        Step::Delayed(delay, Box::new(self))
    }

    async fn play(self, signal: CancellationToken) -> Result<Response, TransportError> {
        let mut step = self;
        let mut delay = Duration::ZERO;
        while let Step::Delayed(wait, inner) = step {
            delay += wait;
            step = *inner;
        }

        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match step {
            Step::Respond {
                status,
                headers,
                body,
            } => Ok(Response::from_parts(status, headers, body)),
            Step::Fail(error) => Err(error),
            Step::Hang => std::future::pending().await,
            Step::CancelAware => {
                signal.cancelled().await;
                Err(TransportError::Cancelled)
            }
            Step::Panic(message) => panic!("{}", message),
            Step::Delayed(..) => unreachable!("delays are unwrapped above"),
        }
    }
}

type SendHook = Box<dyn Fn() + Send + Sync>;

/// An in-memory [`Transport`] that plays a script of [`Step`]s.
///
/// Each call consumes the next step. Once the script runs out, the last step
/// repeats, so `ScriptedTransport::new([Step::status(500)])` fails forever.
/// Every call's request and effective signal are recorded for inspection.
///
/// # Example
///
/// ```rust
/// use robust_fetch::testing::{ScriptedTransport, Step};
/// use robust_fetch::{Request, Transport};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let transport = ScriptedTransport::new([Step::status(500), Step::status(200)]);
/// let request = Request::get("/");
///
/// let first = transport.send(&request, CancellationToken::new()).await.unwrap();
/// let second = transport.send(&request, CancellationToken::new()).await.unwrap();
/// let third = transport.send(&request, CancellationToken::new()).await.unwrap();
///
/// assert_eq!([first.status(), second.status(), third.status()], [500, 200, 200]);
/// assert_eq!(transport.calls(), 3);
/// # });
/// ```
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicU32,
    requests: Mutex<Vec<Request>>,
    signals: Mutex<Vec<CancellationToken>>,
    on_send: Option<SendHook>,
}

impl ScriptedTransport {
    /// Play `steps` in order, repeating the last one.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
            on_send: None,
        }
    }

    /// Play `step` on every call.
    pub fn repeating(step: Step) -> Self {
        Self::new([step])
    }

    /// Run `hook` synchronously at the start of every call.
    pub fn on_send<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_send = Some(Box::new(hook));
        self
    }

    /// Number of calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in call order.
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    /// Effective signals received, in call order.
    pub fn signals(&self) -> Vec<CancellationToken> {
        lock(&self.signals).clone()
    }

    /// Returns true if every signal handed to this transport has been
    /// cancelled, i.e. no attempt left a live scope behind.
    pub fn all_signals_released(&self) -> bool {
        lock(&self.signals)
            .iter()
            .all(CancellationToken::is_cancelled)
    }

    fn next_step(&self) -> Option<Step> {
        let mut last = lock(&self.last);
        match lock(&self.script).pop_front() {
            Some(step) => {
                *last = Some(step.clone());
                Some(step)
            }
            None => last.clone(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: &Request,
        signal: CancellationToken,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());
        lock(&self.signals).push(signal.clone());
        if let Some(hook) = &self.on_send {
            hook();
        }

        let step = self.next_step();
        async move {
            match step {
                Some(step) => step.play(signal).await,
                None => Err(TransportError::message("empty transport script")),
            }
        }
    }
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("remaining", &lock(&self.script).len())
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Assert that a fetch succeeded, evaluating to the `Ok` value.
///
/// This macro will panic with the error's message if the result is `Err`.
///
/// # Example
///
/// ```rust
/// use robust_fetch::{assert_fetch_ok, FetchError, Response};
///
/// let result: Result<Response, FetchError> = Ok(Response::new(204, ""));
/// assert_eq!(assert_fetch_ok!(result).status(), 204);
/// ```
#[macro_export]
macro_rules! assert_fetch_ok {
    ($result:expr) => {
        match $result {
            ::core::result::Result::Ok(value) => value,
            ::core::result::Result::Err(e) => {
                panic!("Expected Ok, got Err: {}", e);
            }
        }
    };
}

/// Assert that a fetch failed with a given [`FetchErrorKind`](crate::FetchErrorKind),
/// evaluating to the error.
///
/// # Example
///
/// ```rust
/// use robust_fetch::{assert_fetch_err, FetchError, FetchErrorKind, Response};
///
/// let result: Result<Response, FetchError> = Err(FetchError::RetriesExhausted {
///     attempts: 2,
///     last_response: None,
/// });
/// let err = assert_fetch_err!(result, FetchErrorKind::RetriesExhausted);
/// assert_eq!(err.attempts(), Some(2));
/// ```
#[macro_export]
macro_rules! assert_fetch_err {
    ($result:expr, $kind:expr) => {
        match $result {
            ::core::result::Result::Err(e) => {
                assert_eq!(e.kind(), $kind, "unexpected error: {}", e);
                e
            }
            ::core::result::Result::Ok(v) => {
                panic!("Expected Err({:?}), got Ok: {:?}", $kind, v);
            }
        }
    };
}
