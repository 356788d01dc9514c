//! # Progress Tracker
//!
//! Reduces a nested job snapshot into a single running estimate.
//!
//! ```text
//! items_total     = totals.total + current.found_items + Σ sync_stack[i].found_items
//! items_processed = totals.total + current.processed
//! ```
//!
//! Absent pieces contribute zero. These are the only functions allowed to
//! compute progress; everything else reads the result.

use crate::snapshot::JobSnapshot;

/// Items processed so far across the whole run.
pub fn items_processed(snapshot: &JobSnapshot) -> u64 {
    let current = snapshot
        .current_item
        .as_ref()
        .map(|item| item.processed_count())
        .unwrap_or(0);

    snapshot.totals.total.saturating_add(current)
}

/// Items the whole run will process, including sub-jobs not started yet.
pub fn items_total(snapshot: &JobSnapshot) -> u64 {
    let current = snapshot
        .current_item
        .as_ref()
        .map(|item| item.target_count)
        .unwrap_or(0);

    let pending = snapshot
        .pending_stack
        .iter()
        .fold(0u64, |sum, item| sum.saturating_add(item.target_count));

    snapshot
        .totals
        .total
        .saturating_add(current)
        .saturating_add(pending)
}

/// Both progress figures for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub items_processed: u64,
    pub items_total: u64,
}

impl Progress {
    pub fn of(snapshot: &JobSnapshot) -> Self {
        Progress {
            items_processed: items_processed(snapshot),
            items_total: items_total(snapshot),
        }
    }

    /// False when the executor reports more processed than total items.
    ///
    /// Worth a diagnostic, never fatal.
    pub fn is_consistent(&self) -> bool {
        self.items_processed <= self.items_total
    }

    /// Completion ratio in `0.0..=1.0` (for display only).
    pub fn ratio(&self) -> f64 {
        if self.items_total == 0 {
            return 0.0;
        }
        (self.items_processed as f64 / self.items_total as f64).min(1.0)
    }
}
