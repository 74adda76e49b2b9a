//! Calendar sync collaborator

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};

/// Refreshes programs and jobs in the Job Store from the listings calendar.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn update(&self) -> AppResult<()>;
}

/// Runs an external sync command and waits for it to exit successfully.
#[derive(Debug, Clone)]
pub struct CommandUpdater {
    argv: Vec<String>,
}

impl CommandUpdater {
    /// `None` when `argv` is empty.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }
}

#[async_trait]
impl Updater for CommandUpdater {
    async fn update(&self) -> AppResult<()> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| AppError::configuration("Empty sync command"))?;
        info!(command = %program, "Running sync command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::external_service(program, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(command = %program, exit_code = ?output.status.code(), "Sync command failed");
            return Err(AppError::external_service(
                program,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        info!(command = %program, "Sync command completed");
        Ok(())
    }
}
