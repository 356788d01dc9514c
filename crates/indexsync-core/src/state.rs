//! # Sync State Machine
//!
//! Owns the phase and visible fields of a run. Nothing else mutates them.
//!
//! ## Phase Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──begin──► Starting ──first snapshot──► Running                  │
//! │                      │                          │  ▲                    │
//! │                      └────────pause─────────────┤  │ resume             │
//! │                                                 ▼  │                    │
//! │                                                Paused                   │
//! │                                                                         │
//! │   Starting|Running ──method=cli──► Observing   (sticky for the run)     │
//! │                                                                         │
//! │   Starting|Running|Paused|Observing ──stop──────────► Cancelled         │
//! │   Starting|Running|Paused|Observing ──interrupt─────► Interrupted       │
//! │   Starting|Running|Paused|Observing ──final totals──► Complete          │
//! │   *                                  ──fatal error───► Error            │
//! │                                                                         │
//! │   Complete, Interrupted, Cancelled, Error: terminal for the run,        │
//! │   begin() is always legal again.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Epochs
//! Every transition that starts or stops a control loop bumps the epoch.
//! A loop remembers the epoch it was started under and may only apply a
//! response while that epoch is still current, so a response that resolves
//! after `stop()`, a new `start()`, or a superseding `resume()` is discarded.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::progress::Progress;
use crate::snapshot::{FinalTotals, JobSnapshot};
use crate::DEFAULT_ITEMS_TOTAL;

// =============================================================================
// Sync Phase
// =============================================================================

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SyncPhase {
    #[default]
    Idle,
    Starting,
    Running,
    Paused,
    /// An external (command-line) process drives the run; we only poll.
    Observing,
    Complete,
    Interrupted,
    Cancelled,
    Error,
}

impl SyncPhase {
    /// Phases in which a run exists and has not ended.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::Starting | SyncPhase::Running | SyncPhase::Paused | SyncPhase::Observing
        )
    }

    /// Phases that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncPhase::Complete | SyncPhase::Interrupted | SyncPhase::Cancelled | SyncPhase::Error
        )
    }

    /// Phases from which a new run may begin.
    pub fn can_begin(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Starting => "starting",
            SyncPhase::Running => "running",
            SyncPhase::Paused => "paused",
            SyncPhase::Observing => "observing",
            SyncPhase::Complete => "complete",
            SyncPhase::Interrupted => "interrupted",
            SyncPhase::Cancelled => "cancelled",
            SyncPhase::Error => "error",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Run State
// =============================================================================

/// Everything a presentation layer needs to render a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RunState {
    #[ts(as = "Option<String>")]
    pub run_id: Option<Uuid>,

    pub phase: SyncPhase,

    /// Whether the active run is a delete-and-resync.
    pub is_deleting: bool,

    #[ts(type = "number")]
    pub items_processed: u64,

    #[ts(type = "number")]
    pub items_total: u64,

    pub start_date_time: Option<String>,

    /// Set only on transition into `Complete` (or seeded from history).
    pub last_sync_date_time: Option<String>,

    pub last_sync_failed: bool,
}

impl Default for RunState {
    fn default() -> Self {
        RunState {
            run_id: None,
            phase: SyncPhase::Idle,
            is_deleting: false,
            items_processed: 0,
            items_total: DEFAULT_ITEMS_TOTAL,
            start_date_time: None,
            last_sync_date_time: None,
            last_sync_failed: false,
        }
    }
}

impl RunState {
    pub fn progress(&self) -> Progress {
        Progress {
            items_processed: self.items_processed,
            items_total: self.items_total,
        }
    }
}

// =============================================================================
// State Machine
// =============================================================================

/// The only writer of [`RunState`].
#[derive(Debug, Clone, Default)]
pub struct SyncStateMachine {
    state: RunState,
    epoch: u64,
}

impl SyncStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the outcome of the last finished sync.
    pub fn with_history(last_sync_date_time: Option<String>, last_sync_failed: bool) -> Self {
        SyncStateMachine {
            state: RunState {
                last_sync_date_time,
                last_sync_failed,
                ..Default::default()
            },
            epoch: 0,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.phase
    }

    pub fn is_deleting(&self) -> bool {
        self.state.is_deleting
    }

    /// Generation of the control loop currently allowed to apply responses.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True if a loop started under `epoch` may still apply a response.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.state.phase.is_active()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// `Idle|terminal -> Starting`. Returns the epoch of the new run.
    pub fn begin(&mut self, is_deleting: bool) -> CoreResult<u64> {
        self.ensure(self.state.phase.can_begin(), "start")?;

        self.state.run_id = Some(Uuid::new_v4());
        self.state.phase = SyncPhase::Starting;
        self.state.is_deleting = is_deleting;
        self.state.items_processed = 0;
        self.state.items_total = DEFAULT_ITEMS_TOTAL;
        self.state.start_date_time = None;
        Ok(self.next_epoch())
    }

    /// `Starting|Running -> Paused`. Returns false if already paused.
    pub fn pause(&mut self) -> CoreResult<bool> {
        match self.state.phase {
            SyncPhase::Paused => Ok(false),
            SyncPhase::Starting | SyncPhase::Running => {
                self.state.phase = SyncPhase::Paused;
                Ok(true)
            }
            _ => Err(self.invalid("pause")),
        }
    }

    /// Re-enters the control loop. Returns the epoch of the new loop.
    ///
    /// From `Paused` this moves back to `Running`. From `Starting` or
    /// `Running` the phase stays and the new loop supersedes the old one.
    pub fn resume(&mut self) -> CoreResult<u64> {
        match self.state.phase {
            SyncPhase::Paused => {
                self.state.phase = SyncPhase::Running;
                Ok(self.next_epoch())
            }
            SyncPhase::Starting | SyncPhase::Running => Ok(self.next_epoch()),
            _ => Err(self.invalid("resume")),
        }
    }

    /// `Starting|Running|Paused|Observing -> Cancelled`.
    pub fn cancel(&mut self) -> CoreResult<()> {
        self.ensure(self.state.phase.is_active(), "stop")?;
        self.state.phase = SyncPhase::Cancelled;
        self.next_epoch();
        Ok(())
    }

    // =========================================================================
    // Response Application
    // =========================================================================

    /// Applies a running snapshot's progress.
    ///
    /// `Starting -> Running` on the first one. A paused run stays paused: the
    /// response to a request that was in flight when pause was requested
    /// still counts.
    pub fn apply_snapshot(&mut self, snapshot: &JobSnapshot) -> CoreResult<Progress> {
        self.ensure(self.state.phase.is_active(), "apply a snapshot")?;

        let progress = Progress::of(snapshot);
        self.state.items_processed = progress.items_processed;
        self.state.items_total = progress.items_total;

        if snapshot.start_date_time.is_some() {
            self.state.start_date_time = snapshot.start_date_time.clone();
        }

        match self.state.phase {
            SyncPhase::Starting => self.state.phase = SyncPhase::Running,
            // The external process decides what kind of run it is.
            SyncPhase::Observing => self.state.is_deleting = snapshot.is_full_reindex,
            _ => {}
        }

        Ok(progress)
    }

    /// `Starting|Running -> Observing`, permanent for this run.
    pub fn observe(&mut self) -> CoreResult<()> {
        match self.state.phase {
            SyncPhase::Observing => Ok(()),
            SyncPhase::Starting | SyncPhase::Running => {
                self.state.phase = SyncPhase::Observing;
                Ok(())
            }
            _ => Err(self.invalid("observe")),
        }
    }

    /// Adopts a run found in progress and owned by an external process.
    pub fn observe_external(&mut self, snapshot: &JobSnapshot) -> CoreResult<u64> {
        self.ensure(self.state.phase.can_begin(), "observe")?;

        self.state.run_id = Some(Uuid::new_v4());
        self.state.phase = SyncPhase::Observing;
        self.state.start_date_time = None;
        let epoch = self.next_epoch();
        self.apply_snapshot(snapshot)?;
        Ok(epoch)
    }

    /// Adopts an unfinished client-driven run as paused.
    pub fn restore_paused(&mut self, snapshot: &JobSnapshot) -> CoreResult<()> {
        self.ensure(self.state.phase.can_begin(), "restore")?;

        self.state.run_id = Some(Uuid::new_v4());
        self.state.phase = SyncPhase::Paused;
        self.state.is_deleting = snapshot.is_full_reindex;
        self.state.start_date_time = None;
        self.next_epoch();
        self.apply_snapshot(snapshot)?;
        Ok(())
    }

    /// `active -> Interrupted`.
    pub fn interrupt(&mut self) -> CoreResult<()> {
        self.ensure(self.state.phase.is_active(), "interrupt")?;
        self.state.phase = SyncPhase::Interrupted;
        self.next_epoch();
        Ok(())
    }

    /// `active -> Complete`, recording the outcome.
    pub fn complete(&mut self, totals: &FinalTotals) -> CoreResult<()> {
        self.ensure(self.state.phase.is_active(), "complete")?;
        self.state.phase = SyncPhase::Complete;
        self.record_history(totals);
        self.next_epoch();
        Ok(())
    }

    /// Records a finished run's outcome without changing phase.
    pub fn record_history(&mut self, totals: &FinalTotals) {
        self.state.last_sync_date_time = Some(totals.end_date_time.clone());
        self.state.last_sync_failed = totals.has_failures();
    }

    /// `* -> Error`.
    pub fn fail(&mut self) {
        self.state.phase = SyncPhase::Error;
        self.next_epoch();
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> CoreResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            from: self.state.phase,
            action,
        }
    }
}
