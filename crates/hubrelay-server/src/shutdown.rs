//! Graceful shutdown via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Signals shutdown to the HTTP server and every subscriber session, and
/// tracks session tasks so shutdown can wait for their close frames.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token observed by server tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Tracker for tasks that must finish before shutdown completes.
    pub fn tasks(&self) -> TaskTracker {
        self.tasks.clone()
    }

    /// Fire the shutdown signal. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the signal, then wait up to `timeout` for `handles` and every
    /// tracked task to finish.
    ///
    /// Tasks still running after the timeout are left to be dropped with
    /// the runtime.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Duration) {
        self.shutdown();
        let _ = self.tasks.close();
        info!(
            task_count = handles.len(),
            tracked = self.tasks.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let tasks = self.tasks.clone();
        let drain = async move {
            let _ = futures::future::join_all(handles).await;
            tasks.wait().await;
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}");
        }
    }
}
