//! Serializable fetch settings.
//!
//! [`FetchConfig`] and [`RetryConfig`] mirror [`FetchOptions`] and
//! [`RetryPolicy`] in a form that can live in a configuration file. Durations
//! are whole milliseconds. Conversion validates the policy, so a config that
//! converts cleanly never produces [`FetchError::InvalidPolicy`].
//!
//! Predicates, hooks and cancellation handles are runtime values; attach them
//! to the converted options in code.
//!
//! # Example
//!
//! ```rust
//! use robust_fetch::config::FetchConfig;
//! use robust_fetch::FetchOptions;
//! use std::time::Duration;
//!
//! let config = FetchConfig::from_json(r#"{
//!     "timeout_ms": 2000,
//!     "retry": { "strategy": "exponential", "attempts": 4, "base_delay_ms": 100 }
//! }"#).unwrap();
//!
//! let options = FetchOptions::try_from(config).unwrap();
//! assert_eq!(options.timeout(), Duration::from_secs(2));
//! assert_eq!(options.retry().delay_for_attempt(1), Duration::from_millis(200));
//! ```
//!
//! [`FetchError::InvalidPolicy`]: crate::FetchError::InvalidPolicy

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::{FetchOptions, DEFAULT_TIMEOUT};
use crate::retry::{RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_DELAY};

/// Retry settings, tagged by `strategy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryConfig {
    /// Constant delay.
    Linear {
        /// Retries after the first attempt.
        attempts: u32,
        /// Delay between attempts.
        delay_ms: u64,
    },
    /// Geometric delay with a cap.
    Exponential {
        /// Retries after the first attempt.
        attempts: u32,
        /// Delay before the first retry.
        base_delay_ms: u64,
        /// Growth factor; defaults to 2.0.
        #[serde(default = "default_backoff_factor")]
        backoff_factor: f64,
        /// Delay cap; defaults to 30 seconds.
        #[serde(default = "default_max_delay_ms")]
        max_delay_ms: u64,
    },
}

/// Settings for one kind of fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-attempt deadline.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry settings; absent means no retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR
}

fn default_max_delay_ms() -> u64 {
    millis(DEFAULT_MAX_DELAY)
}

fn default_timeout_ms() -> u64 {
    millis(DEFAULT_TIMEOUT)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retry: None,
        }
    }
}

impl FetchConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }
}

/// Why a config could not be loaded or converted.
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid config JSON.
    Parse(serde_json::Error),
    /// The retry settings violate a policy invariant.
    InvalidPolicy(&'static str),
    /// `timeout_ms` is zero.
    ZeroTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "invalid fetch config: {}", e),
            Self::InvalidPolicy(reason) => write!(f, "invalid retry policy: {}", reason),
            Self::ZeroTimeout => write!(f, "timeout_ms must be greater than zero"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = ConfigError;

    fn try_from(config: RetryConfig) -> Result<Self, Self::Error> {
        let policy = match config {
            RetryConfig::Linear { attempts, delay_ms } => {
                RetryPolicy::linear(attempts, Duration::from_millis(delay_ms))
            }
            RetryConfig::Exponential {
                attempts,
                base_delay_ms,
                backoff_factor,
                max_delay_ms,
            } => RetryPolicy::exponential(attempts, Duration::from_millis(base_delay_ms))
                .with_backoff_factor(backoff_factor)
                .with_max_delay(Duration::from_millis(max_delay_ms)),
        };
        policy.validate().map_err(ConfigError::InvalidPolicy)?;
        Ok(policy)
    }
}

impl TryFrom<FetchConfig> for FetchOptions {
    type Error = ConfigError;

    fn try_from(config: FetchConfig) -> Result<Self, Self::Error> {
        if config.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let retry = match config.retry {
            Some(retry) => RetryPolicy::try_from(retry)?,
            None => RetryPolicy::none(),
        };
        Ok(FetchOptions::new()
            .with_timeout(Duration::from_millis(config.timeout_ms))
            .with_retry(retry))
    }
}
