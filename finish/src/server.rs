use std::error::Error;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Boxed error type carried by [`ShutdownError::Other`].
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A type which can be shut down.
///
/// This is the only capability [`Finisher`](crate::Finisher) needs from a registered server.
/// Implementations should stop accepting new work, drain what is in flight and return
/// before the deadline carried by `scope`. The coordinator does not preempt a server that
/// ignores its scope, so a shutdown that never returns stalls the remaining servers.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait Server: Send + Sync {
    async fn shutdown(&self, scope: &ShutdownScope) -> Result<(), ShutdownError>;
}

/// Failure reported by [`Server::shutdown`].
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The server did not finish before the scope's deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Any other failure; displayed as the wrapped error's description.
    #[error("{0}")]
    Other(BoxError),
}

impl ShutdownError {
    /// Wraps an arbitrary error or message as [`ShutdownError::Other`].
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Deadline-bound cancellation scope handed to [`Server::shutdown`].
///
/// The scope owns a timer task which cancels its token once the deadline passes.
/// Dropping the scope releases the timer and cancels the token, so every token handed
/// out through [`ShutdownScope::token`] is cancelled once the shutdown call is over.
pub struct ShutdownScope {
    deadline: Instant,
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl ShutdownScope {
    /// Creates a fresh scope that expires `timeout` from now. Timeouts too large to
    /// represent as an instant expire in roughly thirty years instead.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn with_timeout(timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let token = CancellationToken::new();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep_until(deadline).await;
                token.cancel();
            }
        });

        Self {
            deadline,
            token,
            timer,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Returns [`ShutdownError::DeadlineExceeded`] once the deadline has passed.
    pub fn check(&self) -> Result<(), ShutdownError> {
        if self.is_expired() {
            return Err(ShutdownError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Completes when the deadline passes.
    pub async fn expired(&self) {
        self.token.cancelled().await;
    }

    /// Child token for work spawned by the server; cancelled at the deadline.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Races `fut` against the deadline.
    ///
    /// A future that is still pending at the deadline is dropped and
    /// [`ShutdownError::DeadlineExceeded`] is returned.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ShutdownError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            output = fut => Ok(output),
            () = self.expired() => Err(ShutdownError::DeadlineExceeded),
        }
    }
}

impl Drop for ShutdownScope {
    fn drop(&mut self) {
        self.timer.abort();
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_at_deadline() {
        let scope = ShutdownScope::with_timeout(Duration::from_secs(1));
        assert!(!scope.is_expired());
        assert!(scope.check().is_ok());
        assert_eq!(scope.remaining(), Duration::from_secs(1));

        scope.expired().await;

        assert!(scope.is_expired());
        assert_eq!(scope.remaining(), Duration::ZERO);
        assert!(scope.check().unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_output_before_deadline() {
        let scope = ShutdownScope::with_timeout(Duration::from_secs(2));
        let output = scope
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                7
            })
            .await;

        assert_eq!(output.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_after_deadline() {
        let scope = ShutdownScope::with_timeout(Duration::from_secs(1));
        let output = scope
            .run(tokio::time::sleep(Duration::from_secs(2)))
            .await;

        assert!(matches!(output, Err(ShutdownError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_child_tokens() {
        let scope = ShutdownScope::with_timeout(Duration::from_secs(60));
        let token = scope.token();
        assert!(!token.is_cancelled());

        drop(scope);

        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn huge_timeout_saturates_to_far_future() {
        let scope = ShutdownScope::with_timeout(Duration::MAX);
        assert!(!scope.is_expired());
        assert_eq!(scope.remaining(), FAR_FUTURE);

        let output = scope.run(tokio::time::sleep(Duration::from_secs(3600))).await;
        assert!(output.is_ok());
    }

    #[test]
    fn other_error_keeps_description() {
        let err = ShutdownError::other("listener still busy");
        assert_eq!(err.to_string(), "listener still busy");
        assert!(!err.is_timeout());
    }
}
