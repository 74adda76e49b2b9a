//! Operator notifications for the recording lifecycle

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::errors::{AppResult, RecordError};
use crate::models::Program;
use crate::utils::human_format::{gib, whole_gib};

/// Tracing target every notification is emitted under
pub const NOTIFY_TARGET: &str = "kaede::notify";

/// Figures reported once a capture finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    /// Size of the raw capture file
    pub size_bytes: u64,
    /// Free space left on the record volume, if it could be determined
    pub available_bytes: Option<u64>,
}

/// Sink for lifecycle events.
///
/// Callers in the recorder never let an error from here escape; see
/// [`crate::recorder::Recorder`].
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_before_record(&self, program: &Program) -> AppResult<()>;

    async fn notify_after_record(&self, program: &Program, stats: &CaptureStats) -> AppResult<()>;

    /// `program` is the last one known; `None` when it could not be loaded at all.
    async fn notify_exception(&self, error: &RecordError, program: Option<&Program>)
    -> AppResult<()>;

    async fn notify_duration_error(&self, program: &Program, observed_secs: f64) -> AppResult<()>;

    async fn notify_redo_error(&self, program: &Program) -> AppResult<()>;
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }

    pub fn before_record_message(program: &Program) -> String {
        format!("{}を録画する", program.format_title())
    }

    pub fn after_record_message(program: &Program, stats: &CaptureStats) -> String {
        let available = stats
            .available_bytes
            .map(|bytes| format!("残り約{}GB", whole_gib(bytes)))
            .unwrap_or_else(|| "残り容量不明".to_string());
        format!(
            "{}を録画した。ファイルサイズ約{:.2}GB。{}",
            program.format_title(),
            gib(stats.size_bytes),
            available
        )
    }

    pub fn exception_message(error: &RecordError, program: Option<&Program>) -> String {
        match program {
            Some(program) => format!(
                "{}(PID {}) の録画中に失敗した……: {}",
                program.title, program.pid, error
            ),
            None => format!("録画の準備中に失敗した……: {}", error),
        }
    }

    pub fn duration_error_message(program: &Program, observed_secs: f64) -> String {
        format!(
            "{}の長さが{}秒しか無いようだが……",
            program.format_title(),
            observed_secs
        )
    }

    pub fn redo_error_message(program: &Program) -> String {
        format!("{}の再処理にも失敗した……", program.format_title())
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_before_record(&self, program: &Program) -> AppResult<()> {
        info!(
            target: NOTIFY_TARGET,
            event = "before_record",
            pid = program.pid,
            tid = program.tid,
            "{}",
            Self::before_record_message(program)
        );
        Ok(())
    }

    async fn notify_after_record(&self, program: &Program, stats: &CaptureStats) -> AppResult<()> {
        info!(
            target: NOTIFY_TARGET,
            event = "after_record",
            pid = program.pid,
            tid = program.tid,
            size_bytes = stats.size_bytes,
            "{}",
            Self::after_record_message(program, stats)
        );
        Ok(())
    }

    async fn notify_exception(
        &self,
        error: &RecordError,
        program: Option<&Program>,
    ) -> AppResult<()> {
        error!(
            target: NOTIFY_TARGET,
            event = "exception",
            pid = program.map(|p| p.pid),
            "{}",
            Self::exception_message(error, program)
        );
        Ok(())
    }

    async fn notify_duration_error(&self, program: &Program, observed_secs: f64) -> AppResult<()> {
        warn!(
            target: NOTIFY_TARGET,
            event = "duration_error",
            pid = program.pid,
            observed_secs,
            "{}",
            Self::duration_error_message(program, observed_secs)
        );
        Ok(())
    }

    async fn notify_redo_error(&self, program: &Program) -> AppResult<()> {
        error!(
            target: NOTIFY_TARGET,
            event = "redo_error",
            pid = program.pid,
            "{}",
            Self::redo_error_message(program)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ToolError;
    use crate::models::program::tests::sample_program;
    use crate::utils::human_format::BYTES_PER_GIB;
    use tracing_test::traced_test;

    #[test]
    fn test_after_record_message_formats_sizes() {
        let stats = CaptureStats {
            size_bytes: BYTES_PER_GIB * 3 / 2,
            available_bytes: Some(BYTES_PER_GIB * 50 - 1),
        };
        assert_eq!(
            LogNotifier::after_record_message(&sample_program(), &stats),
            "MXで「title #6 sub」を録画した。ファイルサイズ約1.50GB。残り約49GB"
        );
    }

    #[test]
    fn test_after_record_message_without_free_space() {
        let stats = CaptureStats {
            size_bytes: 0,
            available_bytes: None,
        };
        assert!(
            LogNotifier::after_record_message(&sample_program(), &stats).ends_with("残り容量不明")
        );
    }

    #[test]
    fn test_exception_message_mentions_program() {
        let error = RecordError::Tool(ToolError::output("recpt1", "boom"));
        let message = LogNotifier::exception_message(&error, Some(&sample_program()));
        assert!(message.starts_with("title(PID 1234)"));
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_log_notifier_emits_event_field() {
        let notifier = LogNotifier::new();
        notifier.notify_before_record(&sample_program()).await.unwrap();
        notifier
            .notify_duration_error(&sample_program(), 12.5)
            .await
            .unwrap();

        assert!(logs_contain("before_record"));
        assert!(logs_contain("を録画する"));
        assert!(logs_contain("duration_error"));
        assert!(logs_contain("12.5秒"));
    }
}
