//! Program snapshots and the names derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filenames at or above this many bytes fall back to the short form.
pub const MAX_FNAME_BYTES: usize = 200;

const SYOBOI_BASE_URL: &str = "http://cal.syoboi.jp";

/// Immutable snapshot of one airing, joined with its channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Program {
    pub pid: i64,
    pub tid: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub channel_name: String,
    pub channel_for_syoboi: i32,
    pub channel_for_recorder: i32,
    pub count: Option<String>,
    /// Seconds the airing is shifted from its nominal slot
    pub start_offset: i32,
    pub subtitle: String,
    pub title: String,
    pub comment: Option<String>,
}

impl Program {
    pub fn syoboi_url(&self) -> String {
        format!("{}/tid/{}#{}", SYOBOI_BASE_URL, self.tid, self.pid)
    }

    /// Nominal airtime in whole seconds.
    pub fn airtime_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }

    /// Human-readable artifact name used in the cabinet.
    ///
    /// `/` is replaced by a full-width solidus so the name is always a single
    /// path component. When the full name reaches [`MAX_FNAME_BYTES`], the
    /// subtitle and comment are dropped.
    pub fn formatted_fname(&self) -> String {
        let count = self.count.as_deref().unwrap_or_default();
        let comment = match self.comment.as_deref() {
            Some(comment) if !comment.is_empty() => format!(" ({comment})"),
            _ => String::new(),
        };
        let full = sanitize_fname(&format!(
            "{}_{} {} #{} {}{} at {}",
            self.tid, self.pid, self.title, count, self.subtitle, comment, self.channel_name
        ));
        if full.len() < MAX_FNAME_BYTES {
            return full;
        }
        sanitize_fname(&format!(
            "{}_{} {} #{} at {}",
            self.tid, self.pid, self.title, count, self.channel_name
        ))
    }

    /// Title line used in operator notifications.
    pub fn format_title(&self) -> String {
        let mut buf = format!("{}で「{}", self.channel_name, self.title);
        if let Some(count) = &self.count {
            buf.push_str(&format!(" #{count}"));
        }
        buf.push_str(&format!(" {}」", self.subtitle));
        buf
    }
}

/// Keeps the name a single path component on a single line.
fn sanitize_fname(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' => '／',
            '\n' | '\r' => ' ',
            c => c,
        })
        .collect()
}
