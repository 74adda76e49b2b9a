//! Shared fixtures for kaede integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use kaede::config::Config;
use kaede::errors::{AppError, AppResult, RecordError, RecordResult, StoreError, StoreResult};
use kaede::job_scheduling::{JobStore, RecordJob};
use kaede::models::{Channel, Job, Program};
use kaede::services::{CaptureStats, Notifier, Updater};

/// Program on a channel no duration rule matches, 30 minutes long.
pub fn test_program(pid: i64) -> Program {
    Program {
        pid,
        tid: 42,
        start_time: Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 3, 4, 12, 30, 0).unwrap(),
        channel_name: "TEST".to_string(),
        channel_for_syoboi: 1,
        channel_for_recorder: 27,
        count: Some("3".to_string()),
        start_offset: 0,
        subtitle: "subtitle".to_string(),
        title: "Title".to_string(),
        comment: None,
    }
}

/// 1800s of airtime minus the 10s base margin
pub const TEST_PROGRAM_EXPECTED_SECS: i64 = 1790;

/// In-memory [`JobStore`] with the same due-job semantics as the SQL store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<i64, Job>>,
    programs: Mutex<HashMap<i64, Program>>,
    fail_loads: AtomicBool,
    loads: AtomicUsize,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_program(&self, program: Program) {
        self.programs.lock().unwrap().insert(program.pid, program);
    }

    pub fn add_job(&self, pid: i64, enqueued_at: DateTime<Utc>) {
        self.jobs.lock().unwrap().insert(
            pid,
            Job {
                pid,
                enqueued_at,
                finished_at: None,
            },
        );
    }

    /// Program plus a job due `after` from now
    pub fn schedule(&self, pid: i64, after: Duration) {
        self.add_program(test_program(pid));
        self.add_job(pid, Utc::now() + TimeDelta::from_std(after).unwrap());
    }

    pub fn is_finished(&self, pid: i64) -> bool {
        self.jobs
            .lock()
            .unwrap()
            .get(&pid)
            .is_some_and(Job::is_finished)
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of `due_jobs` calls, i.e. generations started
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn due_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sea_orm::DbErr::Custom(
                "store unavailable".to_string(),
            )));
        }
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| !job.is_finished() && job.enqueued_at >= now)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.enqueued_at);
        Ok(jobs)
    }

    async fn program(&self, pid: i64) -> StoreResult<Program> {
        self.programs
            .lock()
            .unwrap()
            .get(&pid)
            .cloned()
            .ok_or_else(|| StoreError::not_found("programs", "pid", pid))
    }

    async fn programs(&self, pids: &[i64]) -> StoreResult<Vec<Program>> {
        let programs = self.programs.lock().unwrap();
        Ok(pids.iter().filter_map(|pid| programs.get(pid).cloned()).collect())
    }

    async fn mark_finished(&self, pid: i64) -> StoreResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&pid)
            .ok_or_else(|| StoreError::not_found("jobs", "pid", pid))?;
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn channels(&self) -> StoreResult<Vec<Channel>> {
        Ok(Vec::new())
    }
}

/// [`RecordJob`] that records when each job ran.
#[derive(Default)]
pub struct FakeRecorder {
    calls: Mutex<Vec<(i64, Instant)>>,
    completed: Mutex<Vec<i64>>,
    delay: Duration,
    failing: HashSet<i64>,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, pid: i64) -> Self {
        self.failing.insert(pid);
        self
    }

    pub fn calls(&self) -> Vec<(i64, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pids(&self) -> Vec<i64> {
        self.calls().into_iter().map(|(pid, _)| pid).collect()
    }

    pub fn completed(&self) -> Vec<i64> {
        self.completed.lock().unwrap().clone()
    }

    /// Poll until at least `count` jobs have started.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.calls.lock().unwrap().len() < count {
            assert!(
                Instant::now() < deadline,
                "expected {count} recordings, got {:?}",
                self.pids()
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl RecordJob for FakeRecorder {
    async fn record(&self, pid: i64) -> RecordResult<()> {
        self.calls.lock().unwrap().push((pid, Instant::now()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.lock().unwrap().push(pid);
        if self.failing.contains(&pid) {
            return Err(RecordError::Enqueue {
                fname: pid.to_string(),
                message: "queue down".to_string(),
            });
        }
        Ok(())
    }
}

/// [`Notifier`] that remembers event names, optionally failing every call.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) -> AppResult<()> {
        self.events.lock().unwrap().push(event);
        if self.fail {
            return Err(AppError::external_service("notifier", "unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_before_record(&self, _program: &Program) -> AppResult<()> {
        self.push("before_record".to_string())
    }

    async fn notify_after_record(&self, _program: &Program, stats: &CaptureStats) -> AppResult<()> {
        self.push(format!("after_record:{}", stats.size_bytes))
    }

    async fn notify_exception(
        &self,
        _error: &RecordError,
        program: Option<&Program>,
    ) -> AppResult<()> {
        self.push(format!("exception:{}", program.is_some()))
    }

    async fn notify_duration_error(&self, _program: &Program, _observed_secs: f64) -> AppResult<()> {
        self.push("duration_error".to_string())
    }

    async fn notify_redo_error(&self, _program: &Program) -> AppResult<()> {
        self.push("redo_error".to_string())
    }
}

#[derive(Default)]
pub struct CountingUpdater {
    calls: AtomicUsize,
}

impl CountingUpdater {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Updater for CountingUpdater {
    async fn update(&self) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Write an executable shell script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Stand-ins for the external tools, all plain shell scripts.
pub struct FakeTools {
    pub dir: PathBuf,
    pub recorder: PathBuf,
    pub decoder: PathBuf,
    pub caption_dumper: PathBuf,
    pub repair: PathBuf,
    pub probe: PathBuf,
    pub statvfs: PathBuf,
}

pub const RAW_CONTENT: &str = "first-chunk:second-chunk";

impl FakeTools {
    /// Tools that succeed, with a probe reporting the given durations in call order.
    ///
    /// The last duration repeats once the list is exhausted.
    pub fn new(dir: &Path, durations: &[f64]) -> Self {
        let dir = dir.to_path_buf();
        // Appends in two steps so the follower sees the file grow
        let recorder = write_script(
            &dir,
            "recorder",
            "printf 'first-chunk:' >> \"$3\"\nsleep 0.2\nprintf 'second-chunk' >> \"$3\"",
        );
        // <decoder> -v0 -s1 -m1 /dev/stdin <cache>
        let decoder = write_script(&dir, "decoder", "cat > \"$5\"");
        let caption_dumper = write_script(&dir, "caption_dumper", "cat");
        let repair = write_script(&dir, "repair", "cp \"$1\" \"$2\"");
        let statvfs = write_script(&dir, "statvfs", "echo '1000000000000 53687091200'");

        let counter = dir.join("probe.count");
        let cases: String = durations
            .iter()
            .enumerate()
            .map(|(i, d)| format!("  {}) d={} ;;\n", i + 1, d))
            .collect();
        let last = durations.last().copied().unwrap_or(0.0);
        let probe = write_script(
            &dir,
            "probe",
            &format!(
                "n=$(cat '{counter}' 2>/dev/null || echo 0)\nn=$((n + 1))\necho $n > '{counter}'\ncase $n in\n{cases}  *) d={last} ;;\nesac\nprintf '{{\"format\":{{\"duration\":\"%s\"}}}}' \"$d\"",
                counter = counter.display(),
            ),
        );

        Self {
            dir,
            recorder,
            decoder,
            caption_dumper,
            repair,
            probe,
            statvfs,
        }
    }

    /// Caption dumper that never produces output
    pub fn with_silent_captions(mut self) -> Self {
        self.caption_dumper = write_script(&self.dir, "caption_dumper_silent", "cat > /dev/null");
        self
    }

    pub fn with_failing_repair(mut self) -> Self {
        self.repair = write_script(&self.dir, "repair_failing", "exit 1");
        self
    }

    /// Tuner that refuses the channel without writing anything
    pub fn with_failing_capture(mut self) -> Self {
        self.recorder = write_script(&self.dir, "recorder_failing", "echo 'tuner busy' >&2\nexit 1");
        self
    }

    /// Decoder that consumes the whole stream and then exits non-zero
    pub fn with_failing_decoder(mut self) -> Self {
        self.decoder = write_script(&self.dir, "decoder_failing", "cat > \"$5\"\nexit 3");
        self
    }

    /// Decoder that exits cleanly without reading its input
    pub fn with_early_exit_decoder(mut self) -> Self {
        self.decoder = write_script(&self.dir, "decoder_early_exit", "exit 0");
        self
    }

    pub fn with_missing_decoder(mut self) -> Self {
        self.decoder = self.dir.join("no-such-decoder");
        self
    }

    /// Number of probe invocations so far
    pub fn probe_calls(&self) -> usize {
        std::fs::read_to_string(self.dir.join("probe.count"))
            .map(|s| s.trim().parse().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Config rooted at `root` that runs these tools.
    pub fn config(&self, root: &Path) -> Config {
        let mut config = Config::default();
        config.storage.record_dir = root.join("record");
        config.storage.cache_dir = root.join("cache");
        config.storage.cabinet_dir = root.join("cabinet");
        config.storage.work_queue_path = root.join("queue.txt");
        config.storage.ensure_directories().unwrap();

        config.tools.recorder = self.recorder.display().to_string();
        config.tools.decoder = self.decoder.display().to_string();
        config.tools.caption_dumper = self.caption_dumper.display().to_string();
        config.tools.repair = self.repair.display().to_string();
        config.tools.probe = self.probe.display().to_string();
        config.tools.statvfs = self.statvfs.display().to_string();
        config.recording.follow_poll_interval = Duration::from_millis(10);
        config
    }
}
