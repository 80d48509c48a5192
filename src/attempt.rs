//! A single transport attempt and its classification.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::cancel::{AttemptScope, Settled};
use crate::transport::{Request, Response, Transport, TransportError};

/// How one attempt ended.
///
/// Produced fresh for every attempt and never mutated.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// A 2xx response.
    Success(Response),
    /// Any other status; kept for the retry predicate.
    NonSuccess(Response),
    /// The transport failed for a reason other than cancellation.
    Transport(TransportError),
    /// The attempt's deadline fired before the transport settled.
    TimedOut,
    /// The caller's cancellation handle fired.
    ExternallyCancelled,
}

/// A non-success [`AttemptOutcome`], as seen by the retry engine.
#[derive(Debug, Clone)]
pub enum AttemptFailure {
    /// Non-2xx response.
    NonSuccess(Response),
    /// Transport-level failure.
    Transport(TransportError),
    /// Deadline fired.
    TimedOut,
    /// Caller cancelled.
    ExternallyCancelled,
}

impl AttemptOutcome {
    /// Separate a success from the failure arms.
    pub fn split(self) -> Result<Response, AttemptFailure> {
        match self {
            AttemptOutcome::Success(response) => Ok(response),
            AttemptOutcome::NonSuccess(response) => Err(AttemptFailure::NonSuccess(response)),
            AttemptOutcome::Transport(error) => Err(AttemptFailure::Transport(error)),
            AttemptOutcome::TimedOut => Err(AttemptFailure::TimedOut),
            AttemptOutcome::ExternallyCancelled => Err(AttemptFailure::ExternallyCancelled),
        }
    }

    /// Returns true for [`AttemptOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }
}

impl AttemptFailure {
    /// The response carried by a non-success failure.
    pub fn response(&self) -> Option<&Response> {
        match self {
            AttemptFailure::NonSuccess(response) => Some(response),
            _ => None,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            AttemptFailure::NonSuccess(response) => format!("status {}", response.status()),
            AttemptFailure::Transport(error) => error.to_string(),
            AttemptFailure::TimedOut => "timed out".to_string(),
            AttemptFailure::ExternallyCancelled => "cancelled by caller".to_string(),
        }
    }
}

/// Perform one transport call under `scope` and classify the result.
///
/// This never retries. A scope that is already cancelled short-circuits
/// without invoking the transport at all.
pub async fn execute_attempt<T>(transport: &T, request: &Request, scope: &AttemptScope) -> AttemptOutcome
where
    T: Transport + ?Sized,
{
    if scope.is_cancelled() {
        return settled_interruption(scope);
    }

    let call = AssertUnwindSafe(transport.send(request, scope.signal().clone())).catch_unwind();

    match scope.run(call).await {
        Settled::Completed(Ok(Ok(response))) => classify_response(response),
        Settled::Completed(Ok(Err(error))) if error.is_cancelled() => settled_interruption(scope),
        Settled::Completed(Ok(Err(error))) => AttemptOutcome::Transport(error),
        Settled::Completed(Err(panic)) => {
            AttemptOutcome::Transport(TransportError::Panicked(panic_message(panic.as_ref())))
        }
        Settled::TimedOut => AttemptOutcome::TimedOut,
        Settled::ExternallyCancelled => AttemptOutcome::ExternallyCancelled,
    }
}

fn classify_response(response: Response) -> AttemptOutcome {
    if response.is_success() {
        AttemptOutcome::Success(response)
    } else {
        AttemptOutcome::NonSuccess(response)
    }
}

fn settled_interruption(scope: &AttemptScope) -> AttemptOutcome {
    match scope.interruption::<()>() {
        Settled::ExternallyCancelled => AttemptOutcome::ExternallyCancelled,
        _ => AttemptOutcome::TimedOut,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
