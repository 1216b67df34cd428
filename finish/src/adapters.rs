//! [`Server`] implementations for common Tokio task shapes.

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::server::{BoxError, Server, ShutdownError, ShutdownScope};

/// Closes the tracker and waits for its tasks until the deadline.
#[async_trait]
impl Server for TaskTracker {
    async fn shutdown(&self, scope: &ShutdownScope) -> Result<(), ShutdownError> {
        self.close();
        tracing::debug!(tasks = self.len(), "Waiting for tracked tasks");
        scope.run(self.wait()).await
    }
}

/// A spawned task that stops once its cancellation token fires, such as an axum server
/// running `with_graceful_shutdown(token.cancelled_owned())`.
pub struct GracefulTask {
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<Result<(), BoxError>>>>,
}

impl GracefulTask {
    /// Spawns the future returned by `run`, handing it the token that asks it to stop.
    pub fn spawn<F, Fut, E>(run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let token = CancellationToken::new();
        let task = run(token.clone());
        let handle = tokio::spawn(async move { task.await.map_err(Into::into) });

        Self {
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[async_trait]
impl Server for GracefulTask {
    /// Cancels the token and waits for the task. A task that missed the deadline stays
    /// pending for the next call; once it finished, later calls return `Ok` right away.
    async fn shutdown(&self, scope: &ShutdownScope) -> Result<(), ShutdownError> {
        self.token.cancel();

        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.as_mut() else {
            return Ok(());
        };

        let joined = scope.run(handle).await?;
        slot.take();
        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ShutdownError::Other(e)),
            Err(join_err) => Err(ShutdownError::other(join_err)),
        }
    }
}
