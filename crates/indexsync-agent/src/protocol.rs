//! # Job-Control Protocol
//!
//! Requests understood by the job executor.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Job-Control Operations                             │
//! │                                                                         │
//! │  RUN BATCH (drive the run one bounded batch further)                   │
//! │  ─────────                                                             │
//! │  client ───► action=run_batch, put_mapping=0|1, nonce                  │
//! │  client ◄─── { data: { message, status, totals, index_meta } }         │
//! │                                                                         │
//! │  INDEX STATUS (observe a run someone else drives)                      │
//! │  ────────────                                                          │
//! │  client ───► action=index_status, nonce                                │
//! │  client ◄─── same envelope as run_batch                                │
//! │                                                                         │
//! │  CANCEL (fire and forget)                                              │
//! │  ──────                                                                │
//! │  client ───► action=cancel_index, nonce                                │
//! │  client ◄─── ack (ignored)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wire format: `application/x-www-form-urlencoded` POST bodies.

/// One job-control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    /// Start or continue a client-driven run.
    RunBatch {
        /// Delete the index and rebuild it from scratch.
        put_mapping: bool,
    },

    /// Read the state of the current run without advancing it.
    IndexStatus,

    /// Ask the executor to halt the current run.
    CancelIndex,
}

impl JobAction {
    /// The `action` form field.
    pub fn name(&self) -> &'static str {
        match self {
            JobAction::RunBatch { .. } => "run_batch",
            JobAction::IndexStatus => "index_status",
            JobAction::CancelIndex => "cancel_index",
        }
    }

    /// Form fields for this request, auth token included.
    pub fn form_fields<'a>(&self, nonce: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut fields = vec![("action", self.name()), ("nonce", nonce)];
        if let JobAction::RunBatch { put_mapping } = self {
            fields.push(("put_mapping", if *put_mapping { "1" } else { "0" }));
        }
        fields
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
