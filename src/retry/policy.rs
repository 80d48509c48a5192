//! Retry policy types and the delay scheduler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::Response;

/// Caller-supplied retry-eligibility predicate.
///
/// Receives the most recent non-success response and the zero-based index of
/// the attempt that just failed. Returning `false` vetoes the retry.
pub type RetryPredicate = Arc<dyn Fn(&Response, u32) -> bool + Send + Sync>;

/// A retry policy describing how many times to retry and how long to wait.
///
/// Policies are pure data: they describe retry behavior but don't execute it.
/// The attempt loop asks the policy for delays; the policy never sleeps.
///
/// `attempts` counts *retries*, not the initial try: a policy with
/// `attempts = 3` allows up to 4 transport calls.
///
/// # Examples
///
/// ```rust
/// use robust_fetch::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(5, Duration::from_millis(100))
///     .with_max_delay(Duration::from_secs(1));
///
/// assert_eq!(policy.attempts(), 5);
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(1));
///
/// // Only retry on gateway errors.
/// let policy = RetryPolicy::linear(3, Duration::from_millis(50))
///     .with_should_retry(|response, _attempt| matches!(response.status(), 502..=504));
/// assert!(policy.has_predicate());
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    backoff: Backoff,
    attempts: u32,
    jitter: JitterStrategy,
    should_retry: Option<RetryPredicate>,
}

/// The backoff variant of a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// The same delay before every retry.
    Linear {
        /// Delay between attempts.
        delay: Duration,
    },
    /// Delay grows geometrically: `min(base_delay * backoff_factor^n, max_delay)`.
    Exponential {
        /// Delay before the first retry.
        base_delay: Duration,
        /// Growth factor per retry; must be positive and finite.
        backoff_factor: f64,
        /// Upper bound on any single delay.
        max_delay: Duration,
    },
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay (AWS recommended).
    Full,
}

/// Information about a retry, passed to the `on_retry` hook.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The failure that triggered the retry.
    pub failure: &'a crate::attempt::AttemptFailure,
    /// Delay before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// Default factor for [`RetryPolicy::exponential`].
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Default cap for [`RetryPolicy::exponential`].
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

impl RetryPolicy {
    /// A policy that never retries.
    ///
    /// ```rust
    /// use robust_fetch::RetryPolicy;
    ///
    /// assert_eq!(RetryPolicy::none().attempts(), 0);
    /// ```
    pub fn none() -> Self {
        Self::linear(0, Duration::ZERO)
    }

    /// Retry up to `attempts` times with a constant delay.
    ///
    /// ```rust
    /// use robust_fetch::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::linear(3, Duration::from_millis(50));
    ///
    /// // Every retry waits 50ms
    /// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(50));
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(50));
    /// ```
    pub fn linear(attempts: u32, delay: Duration) -> Self {
        Self {
            backoff: Backoff::Linear { delay },
            attempts,
            jitter: JitterStrategy::None,
            should_retry: None,
        }
    }

    /// Retry up to `attempts` times with exponentially increasing delay.
    ///
    /// Starts with a factor of [`DEFAULT_BACKOFF_FACTOR`] and a cap of
    /// [`DEFAULT_MAX_DELAY`]; adjust with [`with_backoff_factor`] and
    /// [`with_max_delay`].
    ///
    /// [`with_backoff_factor`]: RetryPolicy::with_backoff_factor
    /// [`with_max_delay`]: RetryPolicy::with_max_delay
    ///
    /// ```rust
    /// use robust_fetch::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(5, Duration::from_millis(100));
    ///
    /// // Delay doubles: 100ms, 200ms, 400ms, ...
    /// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    /// ```
    pub fn exponential(attempts: u32, base_delay: Duration) -> Self {
        Self {
            backoff: Backoff::Exponential {
                base_delay,
                backoff_factor: DEFAULT_BACKOFF_FACTOR,
                max_delay: DEFAULT_MAX_DELAY,
            },
            attempts,
            jitter: JitterStrategy::None,
            should_retry: None,
        }
    }

    /// Set the number of retries.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the exponential growth factor. No effect on linear policies.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        if let Backoff::Exponential { backoff_factor, .. } = &mut self.backoff {
            *backoff_factor = factor;
        }
        self
    }

    /// Set the delay cap. No effect on linear policies.
    ///
    /// ```rust
    /// use robust_fetch::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(10, Duration::from_millis(100))
    ///     .with_max_delay(Duration::from_millis(500));
    ///
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    /// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(500));
    /// ```
    pub fn with_max_delay(mut self, cap: Duration) -> Self {
        if let Backoff::Exponential { max_delay, .. } = &mut self.backoff {
            *max_delay = cap;
        }
        self
    }

    /// Install a retry-eligibility predicate.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Response, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// The factor determines the range of randomness. For example, `0.25` means
    /// the actual delay will be ±25% of the calculated delay.
    ///
    /// A NaN factor means no jitter.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) };
        self.jitter = JitterStrategy::Proportional(factor);
        self
    }

    /// Use full jitter (AWS recommended).
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Number of retries after the initial attempt.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total transport calls this policy allows.
    pub fn max_calls(&self) -> u32 {
        self.attempts.saturating_add(1)
    }

    /// The backoff variant.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// The jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// The retry-eligibility predicate, if configured.
    pub fn should_retry(&self) -> Option<&RetryPredicate> {
        self.should_retry.as_ref()
    }

    /// Returns true if a predicate is configured.
    pub fn has_predicate(&self) -> bool {
        self.should_retry.is_some()
    }

    /// Delay before the retry that follows attempt `attempt` (0-indexed).
    ///
    /// Pure; never overflows and never exceeds `max_delay`.
    ///
    /// ```rust
    /// use robust_fetch::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(5, Duration::from_millis(100))
    ///     .with_max_delay(Duration::from_millis(1000));
    ///
    /// let delays: Vec<u128> = (0..6)
    ///     .map(|n| policy.delay_for_attempt(n).as_millis())
    ///     .collect();
    /// assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Linear { delay } => *delay,
            Backoff::Exponential {
                base_delay,
                backoff_factor,
                max_delay,
            } => exponential_delay(*base_delay, *backoff_factor, *max_delay, attempt),
        }
    }

    /// Delay with jitter applied.
    ///
    /// This is used internally by the attempt loop.
    #[doc(hidden)]
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let cap = match &self.backoff {
            Backoff::Exponential { max_delay, .. } => Some(*max_delay),
            Backoff::Linear { .. } => None,
        };
        self.jitter.apply(base, cap)
    }

    /// Check the invariants that types alone don't enforce.
    ///
    /// ```rust
    /// use robust_fetch::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let bad = RetryPolicy::exponential(3, Duration::from_millis(10)).with_backoff_factor(0.0);
    /// assert!(bad.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), &'static str> {
        match &self.backoff {
            Backoff::Exponential { backoff_factor, .. } if !backoff_factor.is_finite() => {
                Err("backoff_factor must be finite")
            }
            Backoff::Exponential { backoff_factor, .. } if *backoff_factor <= 0.0 => {
                Err("backoff_factor must be greater than zero")
            }
            _ => Ok(()),
        }?;
        match self.jitter {
            JitterStrategy::Proportional(factor) if !(0.0..=1.0).contains(&factor) => {
                Err("jitter factor must be between 0 and 1")
            }
            _ => Ok(()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("backoff", &self.backoff)
            .field("attempts", &self.attempts)
            .field("jitter", &self.jitter)
            .field("should_retry", &self.should_retry.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

fn exponential_delay(base: Duration, factor: f64, cap: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let nanos = base.as_nanos() as f64 * factor.powi(exponent);
    let cap_nanos = cap.as_nanos() as f64;

    if !nanos.is_finite() || nanos >= cap_nanos {
        return cap;
    }
    if nanos <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(nanos.round() as u64)
}

impl JitterStrategy {
    /// Apply jitter to a base delay, then cap it at `max_delay`.
    pub fn apply(&self, base_delay: Duration, max_delay: Option<Duration>) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.as_millis() as f64;
                let jitter_range = base_millis * factor;
                let min = (base_millis - jitter_range).max(0.0);
                let max = base_millis + jitter_range;
                if max <= min {
                    base_delay
                } else {
                    let jittered_millis = rand::rng().random_range(min..=max);
                    Duration::from_millis(jittered_millis as u64)
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX);
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}
