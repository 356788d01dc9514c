//! # Error Types
//!
//! Domain-specific error types for indexsync-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  indexsync-core errors (this file)                                     │
//! │  └── CoreError        - Malformed envelopes, illegal transitions       │
//! │                                                                         │
//! │  indexsync-agent errors (separate crate)                               │
//! │  └── SyncError        - HTTP classification, config, commands          │
//! │                                                                         │
//! │  Flow: CoreError → SyncError → user-facing log entry                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::state::SyncPhase;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core sync logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The job executor replied with a body that does not fit the envelope.
    ///
    /// ## When This Occurs
    /// - Body is not JSON (HTML error page, proxy banner, stray output)
    /// - `data` is missing
    /// - `totals` is still the running form but `index_meta` is absent
    /// - `totals` is an object but lacks `end_date_time`
    #[error("Malformed job response: {0}")]
    MalformedResponse(String),

    /// A command was issued in a phase that does not allow it.
    #[error("Cannot {action} while sync is {from}")]
    InvalidTransition {
        from: SyncPhase,
        action: &'static str,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::MalformedResponse(err.to_string())
    }
}
