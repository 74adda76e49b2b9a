use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod program;

pub use program::Program;

/// A broadcast channel as known to both the tuner and the listings calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: i32,
    pub name: String,
    /// Physical channel number passed to the capture tool
    pub for_recorder: i32,
    /// Channel id used by the listings calendar
    pub for_syoboi: i32,
}

/// A pending or finished capture, keyed by the program it records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub pid: i64,
    /// Absolute instant the job fires at
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// One entry of the scheduler's live snapshot, as returned by `ListScheduled`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledProgram {
    pub program: Program,
    pub enqueued_at: DateTime<Utc>,
}
