//! # Sync Log
//!
//! Append-only, user-facing record of a sync.
//!
//! ## Dual Track
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entries (one physical list, insertion order)                          │
//! │                                                                         │
//! │   #0  info     normal   "Sync started"                                  │
//! │   #1  info     normal   "Processed posts 1 - 10 of 25."                 │
//! │   #2  info     delete   "Deleting index and starting sync"              │
//! │   #3  warning  delete   "Indexing was stopped by another process..."    │
//! │                                                                         │
//! │  entries_for(false) → #0, #1        entries_for(true) → #2, #3          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are never reordered, deduplicated or edited. Only an explicit
//! `clear()` removes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Severity tag shown next to a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LogStatus {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl LogStatus {
    /// Maps the executor's `status` string; unknown values read as info.
    pub fn from_wire(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "success" => LogStatus::Success,
            "warning" => LogStatus::Warning,
            "error" => LogStatus::Error,
            _ => LogStatus::Info,
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatus::Info => write!(f, "info"),
            LogStatus::Success => write!(f, "success"),
            LogStatus::Warning => write!(f, "warning"),
            LogStatus::Error => write!(f, "error"),
        }
    }
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LogEntry {
    pub message: String,
    pub status: LogStatus,

    /// Which logical run wrote this entry: delete-and-resync or normal.
    pub is_deleting: bool,

    #[ts(as = "String")]
    pub logged_at: DateTime<Utc>,
}

/// The ordered log shared by the normal and the delete track.
#[derive(Debug, Clone, Default)]
pub struct SyncLog {
    entries: Vec<LogEntry>,
}

impl SyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one message and returns the stored entry.
    pub fn append(
        &mut self,
        message: impl Into<String>,
        status: LogStatus,
        is_deleting: bool,
    ) -> &LogEntry {
        let index = self.entries.len();
        self.entries.push(LogEntry {
            message: message.into(),
            status,
            is_deleting,
            logged_at: Utc::now(),
        });
        &self.entries[index]
    }

    /// Appends several messages in order, all with the same tag.
    ///
    /// Returns the appended entries.
    pub fn append_all<I, S>(&mut self, messages: I, status: LogStatus, is_deleting: bool) -> &[LogEntry]
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = self.entries.len();
        for message in messages {
            self.append(message, status, is_deleting);
        }
        &self.entries[start..]
    }

    /// All entries, both tracks, in insertion order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries of one track.
    pub fn entries_for(&self, is_deleting: bool) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.is_deleting == is_deleting)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
