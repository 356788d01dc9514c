//! # Job Snapshots
//!
//! Types describing what the external job executor reports after every batch.
//!
//! ## Response Envelope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Job Response Envelope                            │
//! │                                                                         │
//! │  { "data": {                                                           │
//! │      "message":    "..." | ["...", "..."],                              │
//! │      "status":     "info" | "success" | "warning" | "error",            │
//! │      "totals":     [ ]            ◄── run still going (array)           │
//! │                  | { ... }        ◄── run finished (object)             │
//! │      "index_meta": { JobSnapshot }                                     │
//! │  } }                                                                    │
//! │                                                                         │
//! │  The array/object shape of `totals` is the ONLY completion signal.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Nested Job Queue
//! ```text
//!   totals.total          current_sync_item          sync_stack (FIFO)
//!  ┌──────────────┐      ┌──────────────────┐      ┌──────┬──────┬──────┐
//!  │ finished     │      │ found_items: 5   │      │ 3    │ 2    │ ...  │
//!  │ sub-jobs: 10 │      │ processed:   2   │      │      │      │      │
//!  └──────────────┘      └──────────────────┘      └──────┴──────┴──────┘
//! ```
//!
//! Snapshots are replace-not-merge: each one fully describes the run.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::log::LogStatus;

// =============================================================================
// Run Method
// =============================================================================

/// Who is driving the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMethod {
    /// A command-line process owns the run; clients may only observe it.
    Cli,

    /// A client drives the run batch by batch (`web` on the wire).
    #[default]
    #[serde(other)]
    Normal,
}

impl RunMethod {
    /// Returns true if an external process owns the run.
    pub fn is_external(&self) -> bool {
        matches!(self, RunMethod::Cli)
    }
}

impl std::fmt::Display for RunMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMethod::Cli => write!(f, "cli"),
            RunMethod::Normal => write!(f, "normal"),
        }
    }
}

// =============================================================================
// Sub-Jobs
// =============================================================================

/// One bounded unit of indexing work, e.g. one sub-site of a multi-tenant install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubJob {
    /// Total items this sub-job will process.
    #[serde(rename = "found_items", default, deserialize_with = "lenient_u64")]
    pub target_count: u64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub synced: u64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub skipped: u64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub failed: u64,
}

impl SubJob {
    /// A sub-job that has not started yet.
    pub fn pending(target_count: u64) -> Self {
        SubJob {
            target_count,
            ..Default::default()
        }
    }

    /// A sub-job with `processed` items already handled.
    pub fn in_progress(target_count: u64, processed: u64) -> Self {
        SubJob {
            target_count,
            synced: processed,
            ..Default::default()
        }
    }

    /// Items of this sub-job handled so far, whatever their outcome.
    pub fn processed_count(&self) -> u64 {
        self.synced
            .saturating_add(self.skipped)
            .saturating_add(self.failed)
    }
}

// =============================================================================
// Snapshot Totals
// =============================================================================

/// Running totals over all previously finished sub-jobs.
///
/// The executor sends an empty array here before the first sub-job finishes,
/// so anything that is not an object reads as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotTotals {
    pub total: u64,
}

impl<'de> Deserialize<'de> for SnapshotTotals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let total = value.get("total").map(value_as_u64).unwrap_or(0);
        Ok(SnapshotTotals { total })
    }
}

// =============================================================================
// Job Snapshot
// =============================================================================

/// The authoritative description of run progress (`index_meta` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: RunMethod,

    /// Whether this run deletes and rebuilds the index.
    #[serde(rename = "put_mapping", default, deserialize_with = "flexible_bool")]
    pub is_full_reindex: bool,

    #[serde(default)]
    pub totals: SnapshotTotals,

    /// The sub-job presently being processed.
    /// `false`, `[]` or `null` on the wire between sub-jobs.
    #[serde(rename = "current_sync_item", default, deserialize_with = "object_or_none")]
    pub current_item: Option<SubJob>,

    /// Sub-jobs not yet started, processed strictly in order.
    #[serde(rename = "sync_stack", default, deserialize_with = "array_or_empty")]
    pub pending_stack: Vec<SubJob>,

    /// Set once when the run began.
    #[serde(default)]
    pub start_date_time: Option<String>,

    /// Set by the executor when an external process invalidated this run.
    #[serde(rename = "should_interrupt_sync", default, deserialize_with = "flexible_bool")]
    pub should_interrupt: bool,
}

// =============================================================================
// Final Totals
// =============================================================================

/// Summary returned in place of a snapshot once a run completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTotals {
    pub end_date_time: String,

    #[serde(rename = "failed", default, deserialize_with = "lenient_u64")]
    pub failed_count: u64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: u64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub synced: u64,

    #[serde(default, deserialize_with = "lenient_u64")]
    pub skipped: u64,
}

impl FinalTotals {
    /// Returns true if the run finished with items that could not be indexed.
    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}

// =============================================================================
// Parsed Response
// =============================================================================

/// What a response means for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The run is still going.
    InProgress(JobSnapshot),

    /// The run finished.
    Complete(FinalTotals),
}

/// A fully parsed job-control response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResponse {
    /// Human-readable messages the executor wants shown in the log.
    pub messages: Vec<String>,

    /// Status tag for `messages`.
    pub status: LogStatus,

    pub outcome: JobOutcome,
}

#[derive(Deserialize)]
struct RawEnvelope {
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    #[serde(default)]
    message: Option<MessageField>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    totals: Value,
    #[serde(default)]
    index_meta: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

impl JobResponse {
    /// Parses a response body.
    ///
    /// ## Completion Rule
    /// `totals` as an object means complete. An array (or nothing at all)
    /// means running, and then `index_meta` must carry the snapshot.
    pub fn from_json(body: &str) -> CoreResult<Self> {
        let envelope: RawEnvelope = serde_json::from_str(body)?;
        let data = envelope.data;

        let messages = match data.message {
            Some(MessageField::One(message)) if !message.is_empty() => vec![message],
            Some(MessageField::Many(messages)) => {
                messages.into_iter().filter(|m| !m.is_empty()).collect()
            }
            _ => Vec::new(),
        };

        let status = data
            .status
            .as_deref()
            .map(LogStatus::from_wire)
            .unwrap_or_default();

        let outcome = if data.totals.is_object() {
            JobOutcome::Complete(serde_json::from_value(data.totals)?)
        } else if data.totals.is_array() || data.totals.is_null() {
            if !data.index_meta.is_object() {
                return Err(CoreError::MalformedResponse(
                    "running response carries no index_meta".into(),
                ));
            }
            JobOutcome::InProgress(serde_json::from_value(data.index_meta)?)
        } else {
            return Err(CoreError::MalformedResponse(format!(
                "totals must be an array or an object, got {}",
                data.totals
            )));
        };

        Ok(JobResponse {
            messages,
            status,
            outcome,
        })
    }

    /// Returns true if this response ends the run.
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, JobOutcome::Complete(_))
    }
}

// =============================================================================
// Lenient Field Decoding
// =============================================================================

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `true`, `1`, `"1"`, `"true"` and their negatives; null is false.
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_u64().map(|n| n != 0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true" | "yes"),
        _ => false,
    })
}

/// Numbers, numeric strings and null; anything else reads as 0.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_as_u64).unwrap_or(0))
}

fn object_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

fn array_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Array(_)) => {
            serde_json::from_value(value).map_err(serde::de::Error::custom)
        }
        _ => Ok(Vec::new()),
    }
}

fn value_as_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
