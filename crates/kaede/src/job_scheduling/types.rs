//! Types shared by the scheduler loop and its collaborators

use async_trait::async_trait;
use std::fmt;

use crate::errors::RecordResult;

/// Executes one job. Implemented by the recorder pipeline.
#[async_trait]
pub trait RecordJob: Send + Sync {
    async fn record(&self, pid: i64) -> RecordResult<()>;
}

/// Tokens reported by the deadline multiplexer to the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// The timer for this job fired
    Job(i64),
    Reload,
    Stop,
}

/// Lifecycle of [`Scheduler::start`](super::Scheduler::start)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started yet, or reading due jobs for a new generation
    Loading,
    /// Timers armed, waiting for events
    Running,
    Reloading,
    /// No new dispatches; waiting for in-flight recordings
    Stopping,
    Terminated,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Loading => "loading",
            SchedulerState::Running => "running",
            SchedulerState::Reloading => "reloading",
            SchedulerState::Stopping => "stopping",
            SchedulerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// How one generation of the event loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GenerationExit {
    Reload,
    Stop,
}
