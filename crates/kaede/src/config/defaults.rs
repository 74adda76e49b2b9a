/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./kaede/kaede.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Storage defaults
pub const DEFAULT_RECORD_DIR: &str = "./kaede/record";
pub const DEFAULT_CACHE_DIR: &str = "./kaede/cache";
pub const DEFAULT_CABINET_DIR: &str = "./kaede/cabinet";
pub const DEFAULT_WORK_QUEUE_PATH: &str = "./kaede/queue.txt";

// External tool defaults
pub const DEFAULT_RECORDER: &str = "/usr/bin/recpt1";
pub const DEFAULT_DECODER: &str = "/usr/bin/b25";
pub const DEFAULT_CAPTION_DUMPER: &str = "/usr/bin/assdumper";
pub const DEFAULT_REPAIR: &str = "/usr/bin/clean-ts";
pub const DEFAULT_PROBE: &str = "ffprobe";
pub const DEFAULT_STATVFS: &str = "/usr/bin/statvfs";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

// Recording defaults
pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_BASE_MARGIN_SECS: u64 = 10;
pub const DEFAULT_DURATION_TOLERANCE_SECS: u64 = 20;
pub const DEFAULT_FOLLOW_POLL_INTERVAL_MS: u64 = 100;

/// Extra seconds granted to channels that air without commercial breaks.
///
/// Older deployments used 15 here; 25 is the value the recorder has shipped
/// with since, and the one covered by tests.
pub const NO_BREAK_EXTRA_SECS: i64 = 25;
/// Extra seconds for the Sunday 22:27 slot on MX, which routinely overruns.
pub const MX_SUNDAY_EXTRA_SECS: i64 = 180;

// Control plane defaults
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;
