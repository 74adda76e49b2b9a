//! One recording run, from capture to the downstream queue

use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::duration::DurationPolicy;
use super::fan_out::{CHUNK_SIZE, fan_out};
use super::follow::follow_file;
use super::paths::RecordingPaths;
use super::tools::{Consumer, ExternalTools};
use crate::config::{Config, StorageConfig};
use crate::errors::{AppResult, RecordError, RecordResult, ToolError};
use crate::job_scheduling::{JobStore, RecordJob};
use crate::models::Program;
use crate::services::notifier::{CaptureStats, Notifier};
use crate::services::work_queue::WorkQueue;

/// Outcome of a duration check
#[derive(Debug, Clone, Copy, PartialEq)]
enum Verification {
    Accepted,
    Mismatch { observed_secs: f64 },
}

/// Executes jobs fired by the scheduler.
///
/// Each call to [`RecordJob::record`] owns its own processes and paths, so
/// any number of recordings can run concurrently on one `Recorder`.
pub struct Recorder {
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    work_queue: Arc<dyn WorkQueue>,
    tools: ExternalTools,
    policy: DurationPolicy,
    storage: StorageConfig,
    tolerance_secs: f64,
    poll_interval: Duration,
}

impl Recorder {
    pub fn from_config(
        config: &Config,
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        work_queue: Arc<dyn WorkQueue>,
    ) -> AppResult<Self> {
        Ok(Self {
            store,
            notifier,
            work_queue,
            tools: ExternalTools::new(config.tools.clone()),
            policy: DurationPolicy::from_config(&config.recording)?,
            storage: config.storage.clone(),
            tolerance_secs: config.recording.duration_tolerance.as_secs_f64(),
            poll_interval: config.recording.follow_poll_interval,
        })
    }

    async fn run(&self, pid: i64, last_known: &mut Option<Program>) -> RecordResult<()> {
        let program = self.load_program(pid).await?;
        *last_known = Some(program.clone());
        self.notify_safely("before_record", self.notifier.notify_before_record(&program))
            .await;

        let paths = RecordingPaths::new(&self.storage, &program);
        let expected_secs = self.policy.expected_duration(&program);
        info!(
            job_id = pid,
            url = %program.syoboi_url(),
            expected_secs,
            rule = self.policy.matching_rule(&program).map(|rule| rule.name.as_str()),
            "Start recording"
        );
        self.capture(&program, &paths, expected_secs).await?;

        // Picks up edits made while the capture was running
        let program = self.load_program(pid).await?;
        *last_known = Some(program.clone());
        info!(job_id = pid, url = %program.syoboi_url(), "Done recording");

        let stats = self.capture_stats(&paths).await?;
        self.notify_safely(
            "after_record",
            self.notifier.notify_after_record(&program, &stats),
        )
        .await;

        self.verify_or_redo(&program, &paths, expected_secs).await;
        self.finalize(&program, &paths).await
    }

    async fn load_program(&self, pid: i64) -> RecordResult<Program> {
        self.store
            .program(pid)
            .await
            .map_err(|source| RecordError::Program { pid, source })
    }

    /// Live pass: capture to the raw file while tailing it into both consumers.
    ///
    /// Any tool exiting non-zero fails the job.
    async fn capture(
        &self,
        program: &Program,
        paths: &RecordingPaths,
        duration_secs: i64,
    ) -> RecordResult<()> {
        // The follower opens the file before the capture tool has written anything
        File::create(&paths.raw)
            .await
            .map_err(|e| RecordError::filesystem(&paths.raw, e))?;

        let mut capture =
            self.tools
                .spawn_capture(program.channel_for_recorder, duration_secs, &paths.raw)?;
        let Consumer {
            child: mut decoder,
            stdin: decoder_in,
        } = self.tools.spawn_decoder(&paths.cache)?;
        let Consumer {
            child: mut captions,
            stdin: captions_in,
        } = self.tools.spawn_caption_dumper(&paths.cache_ass).await?;

        let done = CancellationToken::new();
        let (follow_tx, follow_rx) = tokio::io::duplex(CHUNK_SIZE * 4);
        let (captured, followed, pumped) = tokio::join!(
            async {
                let status = capture.wait().await;
                done.cancel();
                status
            },
            follow_file(&paths.raw, self.poll_interval, done.clone(), follow_tx),
            fan_out(follow_rx, decoder_in, captions_in),
        );

        match followed {
            Ok(bytes) => debug!(bytes, path = %paths.raw.display(), "Follow reader finished"),
            Err(e) => warn!(path = %paths.raw.display(), "Follow reader failed: {}", e),
        }
        // Reap both consumers before reporting anything
        let decoded = wait_consumer("decoder", &mut decoder).await;
        let dumped = wait_consumer("caption dumper", &mut captions).await;

        let captured = captured.map_err(|e| ToolError::io("recorder", e))?;
        require_success("recorder", captured)?;
        require_success("decoder", decoded?)?;
        require_success("caption dumper", dumped?)?;
        let bytes = pumped.map_err(RecordError::Pump)?;
        debug!(bytes, "Pump finished");
        Ok(())
    }

    /// Offline pass over the completed raw file, used for the redo.
    ///
    /// Returns false when either consumer exits non-zero.
    async fn reprocess(&self, paths: &RecordingPaths) -> RecordResult<bool> {
        let raw = File::open(&paths.raw)
            .await
            .map_err(|e| RecordError::filesystem(&paths.raw, e))?;
        let Consumer {
            child: mut decoder,
            stdin: decoder_in,
        } = self.tools.spawn_decoder(&paths.cache)?;
        let Consumer {
            child: mut captions,
            stdin: captions_in,
        } = self.tools.spawn_caption_dumper(&paths.cache_ass).await?;

        let pumped = fan_out(raw, decoder_in, captions_in).await;
        let decoded = wait_consumer("decoder", &mut decoder).await?;
        let dumped = wait_consumer("caption dumper", &mut captions).await?;
        let bytes = pumped.map_err(RecordError::Pump)?;
        debug!(bytes, "Reprocessed raw capture");

        warn_on_failure("decoder", decoded);
        warn_on_failure("caption dumper", dumped);
        Ok(decoded.success() && dumped.success())
    }

    async fn capture_stats(&self, paths: &RecordingPaths) -> RecordResult<CaptureStats> {
        let size_bytes = tokio::fs::metadata(&paths.raw)
            .await
            .map_err(|e| RecordError::filesystem(&paths.raw, e))?
            .len();
        let available_bytes = match self.tools.available_bytes(&self.storage.record_dir).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Could not determine free space: {}", e);
                None
            }
        };
        Ok(CaptureStats {
            size_bytes,
            available_bytes,
        })
    }

    async fn verify(&self, paths: &RecordingPaths, expected_secs: i64) -> Verification {
        let observed_secs = match self.tools.probe_duration(&paths.cache).await {
            Ok(secs) => secs,
            Err(e) => {
                warn!(path = %paths.cache.display(), "Duration probe failed: {}", e);
                0.0
            }
        };
        if within_tolerance(observed_secs, expected_secs, self.tolerance_secs) {
            Verification::Accepted
        } else {
            Verification::Mismatch { observed_secs }
        }
    }

    /// At most one redo; a failed redo is reported but never stops finalization.
    async fn verify_or_redo(&self, program: &Program, paths: &RecordingPaths, expected_secs: i64) {
        let Verification::Mismatch { observed_secs } = self.verify(paths, expected_secs).await
        else {
            debug!(job_id = program.pid, "Duration verified");
            return;
        };

        warn!(
            job_id = program.pid,
            observed_secs, expected_secs, "Duration mismatch, reprocessing raw capture"
        );
        self.notify_safely(
            "duration_error",
            self.notifier.notify_duration_error(program, observed_secs),
        )
        .await;

        let redone = match self.reprocess(paths).await {
            Ok(true) => self.verify(paths, expected_secs).await == Verification::Accepted,
            Ok(false) => false,
            Err(e) => {
                warn!(job_id = program.pid, "Redo failed: {}", e);
                false
            }
        };
        if redone {
            info!(job_id = program.pid, "Redo succeeded");
        } else {
            self.notify_safely("redo_error", self.notifier.notify_redo_error(program))
                .await;
        }
    }

    async fn finalize(&self, program: &Program, paths: &RecordingPaths) -> RecordResult<()> {
        let fname = program.formatted_fname();
        let cache_named = paths.cache_named(&fname);
        rename(&paths.cache, &cache_named).await?;

        let ass_len = tokio::fs::metadata(&paths.cache_ass)
            .await
            .map_err(|e| RecordError::filesystem(&paths.cache_ass, e))?
            .len();
        if ass_len == 0 {
            tokio::fs::remove_file(&paths.cache_ass)
                .await
                .map_err(|e| RecordError::filesystem(&paths.cache_ass, e))?;
        } else {
            rename(&paths.cache_ass, &paths.cabinet_ass(&fname)).await?;
        }

        info!(job_id = program.pid, fname = %fname, "Repairing into cabinet");
        self.tools
            .repair(&cache_named, &paths.cabinet(&fname))
            .await?;

        self.work_queue.enqueue(&fname).await?;
        info!(job_id = program.pid, fname = %fname, "Enqueued");

        tokio::fs::remove_file(&cache_named)
            .await
            .map_err(|e| RecordError::filesystem(&cache_named, e))?;
        Ok(())
    }

    async fn notify_safely<F>(&self, event: &str, notification: F)
    where
        F: Future<Output = AppResult<()>>,
    {
        if let Err(e) = notification.await {
            warn!(event, "Notifier failed: {}", e);
        }
    }
}

#[async_trait]
impl RecordJob for Recorder {
    async fn record(&self, pid: i64) -> RecordResult<()> {
        let mut last_known = None;
        let result = self.run(pid, &mut last_known).await;
        if let Err(e) = &result {
            self.notify_safely(
                "exception",
                self.notifier.notify_exception(e, last_known.as_ref()),
            )
            .await;
        }
        result
    }
}

/// Accepts `observed` within `tolerance` of `expected`, bounds included.
fn within_tolerance(observed_secs: f64, expected_secs: i64, tolerance_secs: f64) -> bool {
    (observed_secs - expected_secs as f64).abs() <= tolerance_secs
}

async fn wait_consumer(tool: &str, child: &mut Child) -> RecordResult<ExitStatus> {
    Ok(child.wait().await.map_err(|e| ToolError::io(tool, e))?)
}

fn require_success(tool: &str, status: ExitStatus) -> RecordResult<()> {
    if !status.success() {
        return Err(ToolError::exit_status(tool, status).into());
    }
    Ok(())
}

fn warn_on_failure(tool: &str, status: ExitStatus) {
    if !status.success() {
        warn!(tool, %status, "Tool exited unsuccessfully");
    }
}

async fn rename(from: &Path, to: &Path) -> RecordResult<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| RecordError::filesystem(from, e))
}
