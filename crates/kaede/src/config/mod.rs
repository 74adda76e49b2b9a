use anyhow::{Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

/// Environment variable prefix; nested keys use `__`, e.g. `KAEDE_DATABASE__URL`.
pub const ENV_PREFIX: &str = "KAEDE_";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Directory roots for the three stages of an artifact's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Live raw captures written by the capture tool
    #[serde(default = "default_record_dir")]
    pub record_dir: PathBuf,
    /// Intermediate decoded streams and caption dumps
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Final artifacts under human-readable names
    #[serde(default = "default_cabinet_dir")]
    pub cabinet_dir: PathBuf,
    /// Append-only list of finalized filenames for downstream consumers
    #[serde(default = "default_work_queue_path")]
    pub work_queue_path: PathBuf,
}

/// External executables. Only argv, stdio wiring and exit status are relied upon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_recorder")]
    pub recorder: String,
    #[serde(default = "default_decoder")]
    pub decoder: String,
    #[serde(default = "default_caption_dumper")]
    pub caption_dumper: String,
    #[serde(default = "default_repair")]
    pub repair: String,
    #[serde(default = "default_probe")]
    pub probe: String,
    #[serde(default = "default_statvfs")]
    pub statvfs: String,
    #[serde(default = "default_probe_timeout", with = "duration_serde::duration")]
    pub probe_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// IANA zone used when matching duration rules against wall-clock times
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Subtracted from every program's nominal length
    #[serde(default = "default_base_margin", with = "duration_serde::duration")]
    pub base_margin: Duration,
    /// Accepted distance between expected and probed duration, inclusive
    #[serde(
        default = "default_duration_tolerance",
        with = "duration_serde::duration"
    )]
    pub duration_tolerance: Duration,
    /// How often the follow reader re-checks a capture file that has no new bytes
    #[serde(
        default = "default_follow_poll_interval",
        with = "duration_serde::duration"
    )]
    pub follow_poll_interval: Duration,
    /// Ordered heuristics; the first matching rule wins
    #[serde(default = "default_duration_rules")]
    pub duration_rules: Vec<DurationRuleConfig>,
}

/// One row of the expected-duration policy table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationRuleConfig {
    pub name: String,
    /// Regular expression matched against the channel name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekday: Option<Weekday>,
    /// `HH:MM` the program must end at, in the recording timezone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(with = "duration_serde::signed_seconds")]
    pub extra: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    /// argv of the external calendar sync; empty disables `TriggerUpdate`
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Grace period given to the control-plane adapter after the scheduler stops
    #[serde(
        default = "default_shutdown_timeout",
        with = "duration_serde::duration"
    )]
    pub shutdown_timeout: Duration,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_record_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RECORD_DIR)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_cabinet_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CABINET_DIR)
}

fn default_work_queue_path() -> PathBuf {
    PathBuf::from(DEFAULT_WORK_QUEUE_PATH)
}

fn default_recorder() -> String {
    DEFAULT_RECORDER.to_string()
}

fn default_decoder() -> String {
    DEFAULT_DECODER.to_string()
}

fn default_caption_dumper() -> String {
    DEFAULT_CAPTION_DUMPER.to_string()
}

fn default_repair() -> String {
    DEFAULT_REPAIR.to_string()
}

fn default_probe() -> String {
    DEFAULT_PROBE.to_string()
}

fn default_statvfs() -> String {
    DEFAULT_STATVFS.to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS)
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_base_margin() -> Duration {
    Duration::from_secs(DEFAULT_BASE_MARGIN_SECS)
}

fn default_duration_tolerance() -> Duration {
    Duration::from_secs(DEFAULT_DURATION_TOLERANCE_SECS)
}

fn default_follow_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_FOLLOW_POLL_INTERVAL_MS)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)
}

pub fn default_duration_rules() -> Vec<DurationRuleConfig> {
    vec![
        DurationRuleConfig {
            name: "mx-sunday-2227".to_string(),
            channel: Some("^MX$".to_string()),
            weekday: Some(Weekday::Sun),
            end_time: Some("22:27".to_string()),
            extra: MX_SUNDAY_EXTRA_SECS,
        },
        DurationRuleConfig {
            name: "nhk-no-breaks".to_string(),
            channel: Some("NHK".to_string()),
            weekday: None,
            end_time: None,
            extra: NO_BREAK_EXTRA_SECS,
        },
    ]
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            record_dir: default_record_dir(),
            cache_dir: default_cache_dir(),
            cabinet_dir: default_cabinet_dir(),
            work_queue_path: default_work_queue_path(),
        }
    }
}

impl StorageConfig {
    /// Create the record, cache and cabinet directories if they are missing.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.record_dir, &self.cache_dir, &self.cabinet_dir] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.work_queue_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            recorder: default_recorder(),
            decoder: default_decoder(),
            caption_dumper: default_caption_dumper(),
            repair: default_repair(),
            probe: default_probe(),
            statvfs: default_statvfs(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            base_margin: default_base_margin(),
            duration_tolerance: default_duration_tolerance(),
            follow_poll_interval: default_follow_poll_interval(),
            duration_rules: default_duration_rules(),
        }
    }
}

impl RecordingConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(Path::new(&config_file))
    }

    /// Load `config_file`, layering `KAEDE_*` environment overrides on top.
    ///
    /// A missing file is created with the defaults before loading.
    pub fn load_from_file(config_file: &Path) -> Result<Self> {
        if !config_file.exists() {
            let default_config = Self::default();
            if let Some(parent) = config_file.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file.display());
        }

        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_file.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.recording.tz()?;
        crate::recorder::DurationPolicy::from_config(&self.recording)
            .context("Invalid recording.duration_rules")?;
        if self.recording.follow_poll_interval.is_zero() {
            anyhow::bail!("recording.follow_poll_interval must be greater than zero");
        }
        Ok(())
    }
}
