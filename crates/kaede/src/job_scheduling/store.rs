//! Job Store interface consumed by the scheduler and the recorder.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreResult;
use crate::models::{Channel, Job, Program};

/// Persistent job and program storage.
///
/// Implementations must tolerate concurrent calls from the scheduler loop and
/// every in-flight recording. Transient failures are expected to be retried
/// inside the implementation; any error returned here is treated as final.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Unfinished jobs due at or after `now`, earliest first.
    async fn due_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>>;

    /// The program a job records. Missing programs are an error.
    async fn program(&self, pid: i64) -> StoreResult<Program>;

    /// Programs for several jobs at once. Unknown ids are skipped.
    async fn programs(&self, pids: &[i64]) -> StoreResult<Vec<Program>>;

    async fn mark_finished(&self, pid: i64) -> StoreResult<()>;

    async fn channels(&self) -> StoreResult<Vec<Channel>>;
}
