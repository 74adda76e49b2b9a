//! Unix signal transport for the control plane
//!
//! - `SIGHUP`: reload
//! - `SIGUSR1`: run the sync collaborator, then reload
//! - `SIGINT` / `SIGTERM`: stop

use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job_scheduling::SchedulerHandle;

pub struct SignalAdapter {
    task: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl SignalAdapter {
    /// Install the handlers and start translating signals into `handle` calls.
    pub fn spawn(handle: SchedulerHandle) -> std::io::Result<Self> {
        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let shutdown = CancellationToken::new();
        let cancelled = shutdown.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sighup.recv() => {
                        info!("Received SIGHUP, reloading schedules");
                        handle.reload();
                    }
                    _ = sigusr1.recv() => {
                        info!("Received SIGUSR1, running sync");
                        let handle = handle.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle.trigger_update().await {
                                error!("Sync failed: {}", e);
                            }
                        });
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, initiating graceful shutdown");
                        handle.stop();
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT, initiating graceful shutdown");
                        handle.stop();
                    }
                    _ = cancelled.cancelled() => break,
                }
            }
            debug!("Signal adapter stopped");
        });

        Ok(Self { task, shutdown })
    }

    /// Stop the adapter, aborting it if it does not finish within `timeout`.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.shutdown.cancel();
        if tokio::time::timeout(timeout, &mut self.task).await.is_err() {
            warn!("Signal adapter did not stop within {:?}, aborting", timeout);
            self.task.abort();
        }
    }
}
