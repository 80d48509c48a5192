//! Retry policies and the retry decision.
//!
//! Following the "pure core, imperative shell" split:
//!
//! - [`RetryPolicy`] is just data: how many retries, how long to wait
//! - [`decide`] is a pure function from a failed attempt to [`RetryDecision`]
//! - the attempt loop in [`robust_fetch`](crate::robust_fetch) is the only
//!   place that sleeps
//!
//! # Quick Start
//!
//! ```rust
//! use robust_fetch::RetryPolicy;
//! use std::time::Duration;
//!
//! // Up to 3 retries, waiting 100ms, 200ms, 400ms, capped at 1s
//! let policy = RetryPolicy::exponential(3, Duration::from_millis(100))
//!     .with_max_delay(Duration::from_secs(1))
//!     .with_should_retry(|response, _attempt| response.status() >= 500);
//!
//! assert_eq!(policy.max_calls(), 4);
//! ```
//!
//! # Backoff
//!
//! - **Linear**: the same delay before every retry
//! - **Exponential**: `base_delay * backoff_factor^n`, capped at `max_delay`
//!
//! # Jitter Support
//!
//! Jitter adds randomness to delays to prevent thundering herd problems.
//! Enable the `jitter` feature to use jitter:
//!
//! ```toml
//! robust-fetch = { version = "...", features = ["jitter"] }
//! ```
//!
//! ```rust,ignore
//! use robust_fetch::RetryPolicy;
//! use std::time::Duration;
//!
//! // Add ±25% randomness to delays
//! let policy = RetryPolicy::exponential(5, Duration::from_millis(100)).with_jitter(0.25);
//! ```
//!
//! A jittered delay never exceeds the exponential cap.

mod decision;
mod policy;

pub use decision::{decide, RetryDecision};
pub use policy::{
    Backoff, JitterStrategy, RetryEvent, RetryPolicy, RetryPredicate, DEFAULT_BACKOFF_FACTOR,
    DEFAULT_MAX_DELAY,
};
