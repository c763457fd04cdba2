//! Supervised periodic background tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns background loops and stops them together.
pub struct TaskSupervisor {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Token cancelled when [`TaskSupervisor::shutdown`] starts.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run `job` every `period`, sleeping first.
    ///
    /// Cancellation interrupts the sleep; a running job is allowed to finish.
    /// Jobs handle their own errors so one bad iteration never stops the loop.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            info!(task = name, period_secs = period.as_secs(), "Background task started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(period) => {}
                }
                debug!(task = name, "Background task tick");
                job().await;
            }
            info!(task = name, "Background task stopped");
        });
        self.tasks.push((name, handle));
    }

    /// Cancel every task and wait up to `grace` for them to finish.
    /// Tasks still running after that are aborted.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        let deadline = Instant::now() + grace;

        for (name, mut handle) in self.tasks {
            match timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, error = %e, "Background task ended abnormally"),
                Err(_) => {
                    warn!(task = name, "Background task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
