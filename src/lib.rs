//! # robust-fetch
//!
//! Resilient request orchestration: every call gets a bounded per-attempt
//! deadline, honors the caller's cancellation handle, retries according to a
//! declarative policy and can validate the response body before handing it
//! back.
//!
//! ## Philosophy
//!
//! **Pure core, imperative shell**:
//! - [`RetryPolicy`], [`decide`](retry::decide) and [`Validation`] are plain data
//!   and pure functions
//! - [`robust_fetch`] is the only place that sleeps, races timers and talks to
//!   the [`Transport`]
//!
//! Failures are values. The entry points return a [`FetchResult`] and never
//! panic; a [`FetchError`] says exactly why the call ended and how many
//! attempts it took.
//!
//! ## Quick Example
//!
//! ```rust
//! use robust_fetch::prelude::*;
//! use robust_fetch::testing::{ScriptedTransport, Step};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! // Any `Transport` works; this one plays a script.
//! let transport = ScriptedTransport::new([
//!     Step::status(503),
//!     Step::json(200, &serde_json::json!({"id": 42, "name": "Ada"})),
//! ]);
//!
//! let options = FetchOptions::new()
//!     .with_timeout(Duration::from_secs(2))
//!     .with_retry(RetryPolicy::exponential(3, Duration::from_millis(10)));
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct User { id: u64, name: String }
//!
//! let user = robust_fetch_validated(
//!     &transport,
//!     Request::get("https://api.example.test/users/42"),
//!     &options,
//!     &schema::from_deserialize::<User>(),
//! )
//! .await
//! .unwrap();
//!
//! assert_eq!(user.body().name, "Ada");
//! assert_eq!(transport.calls(), 2);
//! # });
//! ```
//!
//! ## Features
//!
//! - `jitter`: randomized retry delays (via `rand`)
//! - `reqwest`: [`ReqwestTransport`], a transport backed by `reqwest::Client`

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod attempt;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fetch;
pub mod retry;
pub mod schema;
pub mod testing;
pub mod transport;

// Re-exports
pub use error::{FetchError, FetchErrorKind, FetchResult};
pub use fetch::{robust_fetch, robust_fetch_validated, FetchOptions, RetryHook};
pub use retry::{Backoff, JitterStrategy, RetryEvent, RetryPolicy};
pub use schema::{Issues, Schema, Validation, ValidationIssue};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{Body, Method, Request, Response, Transport, TransportError};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{FetchError, FetchErrorKind, FetchResult};
    pub use crate::fetch::{robust_fetch, robust_fetch_validated, FetchOptions};
    pub use crate::retry::{RetryEvent, RetryPolicy};
    pub use crate::schema::{self, Schema, Validation, ValidationIssue};
    pub use crate::transport::{Request, Response, Transport, TransportError};
}
