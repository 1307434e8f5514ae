//! Owner of all detached background work.
//!
//! Monitors, upload processing and file steps outlive the request that
//! started them, but never outlive the process unobserved: they are tracked
//! here and cancelled together on shutdown.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

#[derive(Clone, Default)]
pub struct Supervisor {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Token cancelled when the supervisor shuts down.
    pub fn token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every tracked task, including ones spawned while waiting.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Cancels outstanding work and waits up to `grace` for it to finish.
    /// Returns whether everything finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        info!("Stopping {} background task(s)", self.in_flight());
        self.cancel.cancel();
        match tokio::time::timeout(grace, self.drain()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "{} background task(s) still running after {:?}",
                    self.in_flight(),
                    grace
                );
                false
            }
        }
    }
}
