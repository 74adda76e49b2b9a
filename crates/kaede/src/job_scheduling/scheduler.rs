//! Deadline-driven scheduler loop

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, watch};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use super::api::SchedulerHandle;
use super::deadline::{DeadlineMux, Signal};
use super::store::JobStore;
use super::types::{GenerationExit, LoopEvent, RecordJob, SchedulerState};
use crate::errors::StoreResult;
use crate::models::{Job, ScheduledProgram};
use crate::services::updater::Updater;

/// Runs generations of the event loop until stopped.
///
/// Every fired job gets its own task; there is no concurrency cap.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    recorder: Arc<dyn RecordJob>,
    updater: Option<Arc<dyn Updater>>,
    reload: Arc<Signal>,
    stop: Arc<Signal>,
    tracker: TaskTracker,
    scheduled: Arc<RwLock<Vec<ScheduledProgram>>>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    /// Bind the store and the job executor, and create the control signals.
    pub fn setup(store: Arc<dyn JobStore>, recorder: Arc<dyn RecordJob>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Loading);
        Self {
            store,
            recorder,
            updater: None,
            reload: Arc::new(Signal::new()),
            stop: Arc::new(Signal::new()),
            tracker: TaskTracker::new(),
            scheduled: Arc::new(RwLock::new(Vec::new())),
            state,
        }
    }

    /// Attach the sync collaborator used by [`SchedulerHandle::trigger_update`].
    pub fn with_updater(mut self, updater: Arc<dyn Updater>) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle::new(
            self.reload.clone(),
            self.stop.clone(),
            self.scheduled.clone(),
            self.updater.clone(),
            self.state.subscribe(),
        )
    }

    pub fn fire_reload(&self) {
        self.reload.raise();
    }

    pub fn fire_stop(&self) {
        self.stop.raise();
    }

    /// Recordings dispatched and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Run until a stop is observed, then wait for every dispatched recording.
    ///
    /// A Job Store failure while loading aborts the loop; recordings already
    /// running are still awaited before the error is returned.
    pub async fn start(&self) -> StoreResult<()> {
        info!(process_id = std::process::id(), "Starting kaede scheduler");

        let result = loop {
            match self.run_generation().await {
                Ok(GenerationExit::Reload) => continue,
                Ok(GenerationExit::Stop) => break Ok(()),
                Err(e) => {
                    error!("Failed to load schedules: {}", e);
                    break Err(e);
                }
            }
        };

        self.set_state(SchedulerState::Stopping);
        self.scheduled.write().await.clear();
        self.tracker.close();
        if !self.tracker.is_empty() {
            info!(
                in_flight = self.tracker.len(),
                "Waiting for in-flight recordings to complete"
            );
        }
        self.tracker.wait().await;
        self.set_state(SchedulerState::Terminated);
        info!("Scheduler stopped");

        result
    }

    async fn run_generation(&self) -> StoreResult<GenerationExit> {
        self.set_state(SchedulerState::Loading);

        let jobs = self.store.due_jobs(Utc::now()).await?;
        let mut mux = DeadlineMux::new();
        for job in &jobs {
            mux.register(job.enqueued_at, LoopEvent::Job(job.pid));
        }
        mux.register_signal(self.reload.clone(), LoopEvent::Reload);
        mux.register_signal(self.stop.clone(), LoopEvent::Stop);
        self.publish_snapshot(&jobs).await?;
        info!("Loaded {} schedules", jobs.len());

        self.set_state(SchedulerState::Running);
        loop {
            match mux.wait().await {
                LoopEvent::Job(pid) => {
                    self.forget_scheduled(pid).await;
                    self.dispatch(pid);
                }
                LoopEvent::Reload => {
                    info!(abandoned = mux.len(), "Reloading schedules");
                    self.set_state(SchedulerState::Reloading);
                    return Ok(GenerationExit::Reload);
                }
                LoopEvent::Stop => {
                    info!(abandoned = mux.len(), "Stop requested");
                    mux.clear();
                    return Ok(GenerationExit::Stop);
                }
            }
        }
    }

    fn dispatch(&self, pid: i64) {
        let store = self.store.clone();
        let recorder = self.recorder.clone();
        info!(job_id = pid, in_flight = self.tracker.len() + 1, "Dispatching job");

        self.tracker.spawn(async move {
            let started = Instant::now();
            match recorder.record(pid).await {
                Ok(()) => match store.mark_finished(pid).await {
                    Ok(()) => info!(job_id = pid, elapsed = ?started.elapsed(), "Job finished"),
                    Err(e) => error!(job_id = pid, "Failed to mark job finished: {}", e),
                },
                Err(e) => {
                    error!(job_id = pid, elapsed = ?started.elapsed(), "Failed job: {}", e);
                }
            }
        });
    }

    async fn publish_snapshot(&self, jobs: &[Job]) -> StoreResult<()> {
        let pids: Vec<i64> = jobs.iter().map(|job| job.pid).collect();
        let mut programs: HashMap<i64, _> = self
            .store
            .programs(&pids)
            .await?
            .into_iter()
            .map(|program| (program.pid, program))
            .collect();

        let snapshot = jobs
            .iter()
            .filter_map(|job| match programs.remove(&job.pid) {
                Some(program) => Some(ScheduledProgram {
                    program,
                    enqueued_at: job.enqueued_at,
                }),
                None => {
                    warn!(job_id = job.pid, "Job has no program; omitted from listing");
                    None
                }
            })
            .collect();
        *self.scheduled.write().await = snapshot;
        Ok(())
    }

    async fn forget_scheduled(&self, pid: i64) {
        self.scheduled
            .write()
            .await
            .retain(|entry| entry.program.pid != pid);
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }
}
