//! Control plane for the scheduler
//!
//! Transport adapters translate inbound requests into calls on a
//! [`SchedulerHandle`]; none of them reach into the event loop directly.

use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::info;

use super::deadline::Signal;
use super::types::SchedulerState;
use crate::errors::{AppError, AppResult};
use crate::models::ScheduledProgram;
use crate::services::updater::Updater;

#[derive(Clone)]
pub struct SchedulerHandle {
    reload: Arc<Signal>,
    stop: Arc<Signal>,
    scheduled: Arc<RwLock<Vec<ScheduledProgram>>>,
    updater: Option<Arc<dyn Updater>>,
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    pub(crate) fn new(
        reload: Arc<Signal>,
        stop: Arc<Signal>,
        scheduled: Arc<RwLock<Vec<ScheduledProgram>>>,
        updater: Option<Arc<dyn Updater>>,
        state: watch::Receiver<SchedulerState>,
    ) -> Self {
        Self {
            reload,
            stop,
            scheduled,
            updater,
            state,
        }
    }

    /// Re-read due jobs without restarting the process.
    pub fn reload(&self) {
        info!("Control: reload");
        self.reload.raise();
    }

    /// Stop arming timers and drain in-flight recordings.
    pub fn stop(&self) {
        info!("Control: stop");
        self.stop.raise();
    }

    /// Programs still waiting for their timer in the current generation, earliest first.
    pub async fn list_scheduled(&self) -> Vec<ScheduledProgram> {
        self.scheduled.read().await.clone()
    }

    /// Run the sync collaborator, then reload.
    pub async fn trigger_update(&self) -> AppResult<()> {
        let updater = self
            .updater
            .as_ref()
            .ok_or_else(|| AppError::configuration("No sync command configured"))?;
        info!("Control: update");
        updater.update().await?;
        self.reload();
        Ok(())
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Resolve once the scheduler reaches `state`, or when the scheduler is dropped.
    pub async fn wait_for_state(&self, state: SchedulerState) {
        let mut receiver = self.state.clone();
        // An error only means the scheduler is gone
        let _ = receiver.wait_for(|current| *current == state).await;
    }
}
