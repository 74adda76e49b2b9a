//! External executables used by the recorder
//!
//! Only argv, stdio wiring and exit status are relied upon, so any
//! executable with a compatible command line can stand in for the defaults.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, trace};

use crate::config::ToolsConfig;
use crate::errors::{ToolError, ToolResult};

#[derive(Debug, Clone)]
pub struct ExternalTools {
    config: ToolsConfig,
}

/// A consumer process together with the pipe feeding it
pub struct Consumer {
    pub child: Child,
    pub stdin: ChildStdin,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ExternalTools {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    /// `<recorder> <channel> <seconds> <raw>`
    pub fn spawn_capture(&self, channel: i32, duration_secs: i64, raw: &Path) -> ToolResult<Child> {
        let tool = &self.config.recorder;
        debug!(tool, channel, duration_secs, path = %raw.display(), "Spawning capture");
        Command::new(tool)
            .arg(channel.to_string())
            .arg(duration_secs.to_string())
            .arg(raw)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::spawn(tool, e))
    }

    /// `<decoder> -v0 -s1 -m1 /dev/stdin <cache>`, fed through stdin
    pub fn spawn_decoder(&self, cache: &Path) -> ToolResult<Consumer> {
        let tool = &self.config.decoder;
        debug!(tool, path = %cache.display(), "Spawning decoder");
        let mut child = Command::new(tool)
            .args(["-v0", "-s1", "-m1", "/dev/stdin"])
            .arg(cache)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::spawn(tool, e))?;
        let stdin = take_stdin(tool, &mut child)?;
        Ok(Consumer { child, stdin })
    }

    /// `<caption_dumper> /dev/stdin`, stdout redirected into `ass`
    pub async fn spawn_caption_dumper(&self, ass: &Path) -> ToolResult<Consumer> {
        let tool = &self.config.caption_dumper;
        debug!(tool, path = %ass.display(), "Spawning caption dumper");
        let output = tokio::fs::File::create(ass)
            .await
            .map_err(|e| ToolError::io(tool, e))?
            .into_std()
            .await;
        let mut child = Command::new(tool)
            .arg("/dev/stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::from(output))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::spawn(tool, e))?;
        let stdin = take_stdin(tool, &mut child)?;
        Ok(Consumer { child, stdin })
    }

    /// `<repair> <src> <dst>`; a non-zero exit is an error.
    pub async fn repair(&self, src: &Path, dst: &Path) -> ToolResult<()> {
        let tool = &self.config.repair;
        debug!(tool, src = %src.display(), dst = %dst.display(), "Repairing container");
        let status = Command::new(tool)
            .arg(src)
            .arg(dst)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| ToolError::spawn(tool, e))?;
        if !status.success() {
            return Err(ToolError::exit_status(tool, status));
        }
        Ok(())
    }

    /// Container duration in seconds, ffprobe style.
    pub async fn probe_duration(&self, path: &Path) -> ToolResult<f64> {
        let tool = &self.config.probe;
        let mut cmd = Command::new(tool);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.probe_timeout, cmd.output())
            .await
            .map_err(|_| {
                ToolError::output(tool, format!("timed out after {:?}", self.config.probe_timeout))
            })?
            .map_err(|e| ToolError::spawn(tool, e))?;
        if !output.status.success() {
            return Err(ToolError::exit_status(tool, output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(tool, output = %stdout, "Probe output");
        parse_probe_duration(&stdout).map_err(|message| ToolError::output(tool, message))
    }

    /// Free bytes on the volume holding `dir`, from `<statvfs> <dir>` printing `total avail`.
    pub async fn available_bytes(&self, dir: &Path) -> ToolResult<u64> {
        let tool = &self.config.statvfs;
        let output = Command::new(tool)
            .arg(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ToolError::spawn(tool, e))?;
        if !output.status.success() {
            return Err(ToolError::exit_status(tool, output.status));
        }
        parse_statvfs(&String::from_utf8_lossy(&output.stdout))
            .map_err(|message| ToolError::output(tool, message))
    }
}

fn take_stdin(tool: &str, child: &mut Child) -> ToolResult<ChildStdin> {
    child
        .stdin
        .take()
        .ok_or_else(|| ToolError::output(tool, "stdin was not captured"))
}

fn parse_probe_duration(stdout: &str) -> Result<f64, String> {
    let parsed: ProbeOutput =
        serde_json::from_str(stdout).map_err(|e| format!("invalid JSON: {e}"))?;
    let duration = parsed
        .format
        .and_then(|format| format.duration)
        .ok_or_else(|| "no format.duration in output".to_string())?;
    duration
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid duration '{duration}': {e}"))
}

fn parse_statvfs(stdout: &str) -> Result<u64, String> {
    let mut fields = stdout.split_whitespace();
    let _total = fields.next().ok_or_else(|| "empty output".to_string())?;
    let avail = fields
        .next()
        .ok_or_else(|| format!("expected 'total avail', got '{}'", stdout.trim()))?;
    avail
        .parse::<u64>()
        .map_err(|e| format!("invalid available size '{avail}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"format":{"duration":"1790.123000"}}"#, 1790.123)]
    #[case("{\n  \"format\": {\n    \"duration\": \"20.0\"\n  }\n}\n", 20.0)]
    fn test_parse_probe_duration(#[case] stdout: &str, #[case] expected: f64) {
        let parsed = parse_probe_duration(stdout).unwrap();
        assert!((parsed - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case("")]
    #[case("{}")]
    #[case(r#"{"format":{}}"#)]
    #[case(r#"{"format":{"duration":"N/A"}}"#)]
    fn test_parse_probe_duration_rejects(#[case] stdout: &str) {
        assert!(parse_probe_duration(stdout).is_err());
    }

    #[rstest]
    #[case("1000000000000 53687091200\n", 53_687_091_200)]
    #[case("1 2", 2)]
    fn test_parse_statvfs(#[case] stdout: &str, #[case] expected: u64) {
        assert_eq!(parse_statvfs(stdout).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1000")]
    #[case("1000 lots")]
    fn test_parse_statvfs_rejects(#[case] stdout: &str) {
        assert!(parse_statvfs(stdout).is_err());
    }

    #[tokio::test]
    async fn test_repair_failure_is_an_error() {
        let tools = ExternalTools::new(ToolsConfig {
            repair: "/bin/false".to_string(),
            ..ToolsConfig::default()
        });
        let result = tools.repair(Path::new("/tmp/a"), Path::new("/tmp/b")).await;
        assert!(matches!(result, Err(ToolError::ExitStatus { .. })));
    }

    #[tokio::test]
    async fn test_missing_tool_is_a_spawn_error() {
        let tools = ExternalTools::new(ToolsConfig {
            statvfs: "/nonexistent/statvfs".to_string(),
            ..ToolsConfig::default()
        });
        let result = tools.available_bytes(Path::new("/")).await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }
}
