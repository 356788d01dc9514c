//! # Sync Error Types
//!
//! Error types for job-control operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  AuthExpired    │  │  MalformedResponse      │ │
//! │  │  InvalidUrl     │  │  Unexpected-    │  │                         │ │
//! │  │  ConfigLoad/    │  │    Response     │  │                         │ │
//! │  │  ConfigSave     │  │  RequestFailed  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Orchestration  │   Transport + protocol errors are FATAL: the run  │
//! │  │                 │   moves to Error and is never retried on its own. │
//! │  │  InvalidCommand │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request superseded by a newer one is not an error at all; the
//! coordinator resolves it to `None`.

use indexsync_core::{CoreError, SyncPhase};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible job-control failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// HTTP 403: the session or nonce expired.
    #[error("Authorization expired (HTTP 403)")]
    AuthExpired,

    /// Any other non-2xx status.
    #[error("Unexpected response (HTTP {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// No HTTP status at all: connection refused, client timeout, etc.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Body could not be parsed into the job-control envelope.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Orchestration Errors
    // =========================================================================
    /// Command not allowed in the current phase.
    #[error("Cannot {command} while sync is {phase}")]
    InvalidCommand {
        command: &'static str,
        phase: SyncPhase,
    },
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedResponse(msg) => SyncError::MalformedResponse(msg),
            CoreError::InvalidTransition { from, action } => SyncError::InvalidCommand {
                command: action,
                phase: from,
            },
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedResponse(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status == reqwest::StatusCode::FORBIDDEN => SyncError::AuthExpired,
            Some(status) => SyncError::UnexpectedResponse {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None if err.is_decode() => SyncError::MalformedResponse(err.to_string()),
            None => SyncError::RequestFailed(err.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error ends the run.
    ///
    /// None of these are retried automatically; retry is a new `start()`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::AuthExpired
                | SyncError::UnexpectedResponse { .. }
                | SyncError::RequestFailed(_)
                | SyncError::MalformedResponse(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// The actionable message written to the sync log for this error.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::AuthExpired => "Permission denied: your session has expired. \
                 Reload the page (or refresh the auth token) and start the sync again."
                .to_string(),
            SyncError::UnexpectedResponse { status, .. } => format!(
                "Something went wrong while syncing: the server answered with HTTP {}. \
                 Check the server error log, then start the sync again.",
                status
            ),
            SyncError::RequestFailed(_) => "Something went wrong while syncing: the server \
                 could not be reached or did not answer in time. Check connectivity and the \
                 server error log, then start the sync again."
                .to_string(),
            SyncError::MalformedResponse(_) => "Something went wrong while syncing: the server \
                 returned an unexpected response. Check the server error log for stray output \
                 or proxy errors, then start the sync again."
                .to_string(),
            other => other.to_string(),
        }
    }
}
