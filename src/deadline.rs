//! Operation-scoped deadline and cancellation
//!
//! A [`Deadline`] combines an optional wall-clock limit with a
//! [`CancellationToken`]. Every wait in the client (retry backoff, poll
//! interval, in-flight request) races against [`Deadline::expired`], so a
//! single signal stops the whole operation.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation signal for one caller-facing operation
#[derive(Clone, Debug)]
pub struct Deadline {
    at: Option<Instant>,
    token: CancellationToken,
}

impl Deadline {
    /// Expire `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// Never expire on its own; only cancellation ends it
    pub fn never() -> Self {
        Self {
            at: None,
            token: CancellationToken::new(),
        }
    }

    /// Use a child of `parent` as the cancellation signal
    ///
    /// Cancelling `parent` (e.g. on Ctrl-C) cancels this deadline; cancelling
    /// this deadline leaves `parent` untouched.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.token = parent.child_token();
        self
    }

    /// Cancel the operation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the limit has passed or the token was cancelled
    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolve when the limit passes or the token is cancelled
    pub async fn expired(&self) {
        match self.at {
            Some(at) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(at) => {}
                    _ = self.token.cancelled() => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Sleep for `duration` unless the deadline fires first
    ///
    /// Returns `false` when the sleep was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.expired() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_after_timeout() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_cut_short_by_deadline() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let start = Instant::now();

        assert!(!deadline.sleep(Duration::from_secs(30)).await);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "woke too early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(30), "slept too long: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_within_deadline() {
        let deadline = Deadline::after(Duration::from_secs(30));
        assert!(deadline.sleep(Duration::from_secs(1)).await);
        assert!(!deadline.is_expired());
    }

    #[tokio::test]
    async fn cancellation_wakes_sleepers() {
        let deadline = Deadline::never();
        let sleeper = deadline.clone();

        let handle = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(3600)).await });
        deadline.cancel();

        assert!(!handle.await.unwrap());
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let deadline = Deadline::never().with_parent(&parent);

        parent.cancel();
        deadline.expired().await;
        assert!(deadline.is_expired());
    }

    #[tokio::test]
    async fn child_cancellation_does_not_reach_parent() {
        let parent = CancellationToken::new();
        let deadline = Deadline::never().with_parent(&parent);

        deadline.cancel();
        assert!(deadline.is_expired());
        assert!(!parent.is_cancelled());
    }
}
