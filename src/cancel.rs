//! Per-attempt cancellation scopes.
//!
//! Every attempt observes exactly one *effective* signal. It is composed from
//! the caller's cancellation handle (if any) and a deadline timer:
//!
//! ```text
//! external token ──┐
//!                  ├──> effective signal ──> transport
//! deadline timer ──┘
//! ```
//!
//! The effective signal is a child of the external token, so external
//! cancellation reaches it structurally without any listener bookkeeping. The
//! deadline lives inside [`AttemptScope::run`] and is dropped with the attempt.
//! Dropping the scope cancels the effective signal and detaches it from the
//! external token, whichever way the attempt ended.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};

/// How a future raced against an [`AttemptScope`] settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    /// The future finished before either signal fired.
    Completed(T),
    /// The deadline fired first.
    TimedOut,
    /// The caller's handle fired first.
    ExternallyCancelled,
}

/// Cancellation context for a single attempt.
///
/// # Examples
///
/// ```
/// use robust_fetch::cancel::{AttemptScope, Settled};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test::block_on(async {
/// let external = CancellationToken::new();
/// let scope = AttemptScope::compose(Some(&external), Duration::from_secs(1));
///
/// let settled = scope.run(async { 7 }).await;
/// assert_eq!(settled, Settled::Completed(7));
///
/// let signal = scope.signal().clone();
/// drop(scope);
///
/// // Released on drop; the caller's handle is untouched.
/// assert!(signal.is_cancelled());
/// assert!(!external.is_cancelled());
/// # });
/// ```
#[derive(Debug)]
pub struct AttemptScope {
    signal: CancellationToken,
    external: Option<CancellationToken>,
    timeout: Duration,
    _release: DropGuard,
}

impl AttemptScope {
    /// Compose the effective signal for one attempt.
    ///
    /// If `external` is already cancelled, the effective signal is cancelled
    /// before this returns.
    pub fn compose(external: Option<&CancellationToken>, timeout: Duration) -> Self {
        let signal = match external {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let release = signal.clone().drop_guard();

        Self {
            signal,
            external: external.cloned(),
            timeout,
            _release: release,
        }
    }

    /// The effective signal handed to the transport.
    pub fn signal(&self) -> &CancellationToken {
        &self.signal
    }

    /// The per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true once the effective signal has fired, for any reason.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Returns true if the caller's own handle has fired.
    pub fn is_externally_cancelled(&self) -> bool {
        self.external
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Attribute a cancellation to its origin.
    ///
    /// The effective signal only fires through the external handle or the
    /// deadline, so anything not caused by the caller is a timeout.
    pub fn interruption<T>(&self) -> Settled<T> {
        if self.is_externally_cancelled() {
            Settled::ExternallyCancelled
        } else {
            Settled::TimedOut
        }
    }

    /// Race `future` against the deadline and the external handle.
    ///
    /// When the deadline wins, the effective signal is cancelled so that a
    /// cooperative transport stops its work. The losing future is dropped.
    pub async fn run<F>(&self, future: F) -> Settled<F::Output>
    where
        F: Future,
    {
        if self.signal.is_cancelled() {
            return self.interruption();
        }

        let deadline = tokio::time::sleep(self.timeout);
        tokio::select! {
            biased;
            _ = self.signal.cancelled() => self.interruption(),
            _ = deadline => {
                self.signal.cancel();
                Settled::TimedOut
            }
            value = future => Settled::Completed(value),
        }
    }
}

/// Outcome of waiting out a retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The full delay elapsed.
    Elapsed,
    /// The caller's handle fired during the wait.
    Cancelled,
}

/// Sleep for `delay` unless `cancellation` fires first.
pub async fn cancellable_sleep(delay: Duration, cancellation: Option<&CancellationToken>) -> Wait {
    match cancellation {
        Some(token) => {
            if token.is_cancelled() {
                return Wait::Cancelled;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => Wait::Cancelled,
                _ = tokio::time::sleep(delay) => Wait::Elapsed,
            }
        }
        None => {
            tokio::time::sleep(delay).await;
            Wait::Elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let scope = AttemptScope::compose(None, Duration::from_secs(1));
        let settled = scope
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                "done"
            })
            .await;
        assert_eq!(settled, Settled::Completed("done"));
        assert!(!scope.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_effective_signal() {
        let scope = AttemptScope::compose(None, Duration::from_millis(50));
        let signal = scope.signal().clone();

        let settled = scope.run(std::future::pending::<()>()).await;

        assert_eq!(settled, Settled::TimedOut);
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancellation_mid_attempt() {
        let external = CancellationToken::new();
        let scope = AttemptScope::compose(Some(&external), Duration::from_secs(10));

        let trigger = external.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let settled = scope.run(std::future::pending::<()>()).await;
        assert_eq!(settled, Settled::ExternallyCancelled);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_polls_future() {
        let external = CancellationToken::new();
        external.cancel();

        let scope = AttemptScope::compose(Some(&external), Duration::from_secs(1));
        assert!(scope.is_cancelled());

        let polled = std::sync::atomic::AtomicBool::new(false);
        let settled = scope
            .run(async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
            })
            .await;

        assert_eq!(settled, Settled::ExternallyCancelled);
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drop_releases_signal_but_not_parent() {
        let external = CancellationToken::new();
        let scope = AttemptScope::compose(Some(&external), Duration::from_secs(1));
        let signal = scope.signal().clone();

        drop(scope);

        assert!(signal.is_cancelled());
        assert!(!external.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_sleep_elapses() {
        let token = CancellationToken::new();
        let wait = cancellable_sleep(Duration::from_millis(100), Some(&token)).await;
        assert_eq!(wait, Wait::Elapsed);
        assert_eq!(cancellable_sleep(Duration::ZERO, None).await, Wait::Elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_sleep_aborts_on_cancel() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let wait = cancellable_sleep(Duration::from_secs(60), Some(&token)).await;

        assert_eq!(wait, Wait::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
