//! The transport boundary.
//!
//! The orchestrator does not perform HTTP itself. It hands each attempt to a
//! [`Transport`], together with the attempt's effective cancellation signal,
//! and classifies whatever comes back.
//!
//! Implementations should treat the signal as advisory: when it fires, stop
//! the exchange and return [`TransportError::Cancelled`]. The orchestrator
//! stops awaiting the call as soon as the signal fires regardless, so a
//! transport that ignores it cannot stretch a timeout.
//!
//! # Implementing a transport
//!
//! ```
//! use robust_fetch::{Request, Response, Transport, TransportError};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Fixed(u16);
//!
//! impl Transport for Fixed {
//!     async fn send(
//!         &self,
//!         _request: &Request,
//!         _signal: CancellationToken,
//!     ) -> Result<Response, TransportError> {
//!         Ok(Response::new(self.0, "fixed"))
//!     }
//! }
//! ```

mod message;
#[cfg(feature = "reqwest")]
mod reqwest_transport;

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use message::{Body, Headers, Method, Request, Response};
#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;

/// Shared, type-erased error cause.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Performs one HTTP exchange.
pub trait Transport: Send + Sync {
    /// Send `request`, observing `signal` for cancellation.
    fn send(
        &self,
        request: &Request,
        signal: CancellationToken,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(
        &self,
        request: &Request,
        signal: CancellationToken,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        (**self).send(request, signal)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        request: &Request,
        signal: CancellationToken,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        (**self).send(request, signal)
    }
}

/// A failure below the HTTP status level.
///
/// Causes are reference counted so the error stays `Clone` and can be kept
/// on the terminal [`FetchError`](crate::FetchError) without re-running the call.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The exchange observed its cancellation signal and stopped.
    Cancelled,
    /// No connection could be established.
    Connect(Cause),
    /// The connection failed mid-exchange.
    Io(Cause),
    /// The response body could not be parsed.
    MalformedBody(Cause),
    /// The transport or schema future panicked; the payload message is kept.
    Panicked(String),
    /// Any other failure.
    Other(Cause),
}

impl TransportError {
    /// Wrap a connection failure.
    pub fn connect<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self::Connect(Arc::new(error))
    }

    /// Wrap an I/O failure.
    pub fn io<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self::Io(Arc::new(error))
    }

    /// Wrap a body parsing failure.
    pub fn malformed_body<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self::MalformedBody(Arc::new(error))
    }

    /// Wrap any other failure.
    pub fn other<E: StdError + Send + Sync + 'static>(error: E) -> Self {
        Self::Other(Arc::new(error))
    }

    /// Build an error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Other(Arc::new(Message(msg.into())))
    }

    /// Returns true for a cancellation-shaped failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the body, not the exchange, was at fault.
    pub fn is_malformed_body(&self) -> bool {
        matches!(self, Self::MalformedBody(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "request cancelled"),
            Self::Connect(e) => write!(f, "connection failed: {}", e),
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::MalformedBody(e) => write!(f, "malformed response body: {}", e),
            Self::Panicked(msg) => write!(f, "panicked: {}", msg),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connect(e) | Self::Io(e) | Self::MalformedBody(e) | Self::Other(e) => {
                Some(e.as_ref() as &(dyn StdError + 'static))
            }
            Self::Cancelled | Self::Panicked(_) => None,
        }
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}
