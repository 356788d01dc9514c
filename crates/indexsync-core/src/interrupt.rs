//! # Interruption Detector
//!
//! Recognises a run that an external process has invalidated for this client.
//!
//! An interruption is not an error: the run simply ends early. What matters is
//! the message. A delete-and-resync that stops half way leaves the index
//! partially rebuilt, so that case gets a data-integrity warning.

use crate::log::LogStatus;
use crate::snapshot::JobSnapshot;

/// An externally forced stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interruption {
    /// Whether the interrupted run was deleting and rebuilding the index.
    pub is_deleting: bool,
}

/// Returns `Some` iff the executor set `should_interrupt_sync`.
///
/// `is_deleting` is the interrupted run's own flag, so the message always
/// matches the log track it is written to.
pub fn classify(snapshot: &JobSnapshot, is_deleting: bool) -> Option<Interruption> {
    snapshot
        .should_interrupt
        .then_some(Interruption { is_deleting })
}

impl Interruption {
    /// The single log line written for this interruption.
    pub fn message(&self) -> &'static str {
        if self.is_deleting {
            "Indexing was stopped by another process while the index was being rebuilt. \
             The index may be missing content and search results may be incorrect or \
             incomplete until a fresh sync completes. Start a new sync to rebuild it."
        } else {
            "Sync interrupted by another process."
        }
    }

    pub fn status(&self) -> LogStatus {
        if self.is_deleting {
            LogStatus::Warning
        } else {
            LogStatus::Info
        }
    }
}
