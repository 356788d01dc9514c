//! # indexsync-core: Pure Sync Logic for IndexSync
//!
//! This crate is the **heart** of IndexSync. It contains everything about an
//! index synchronization run that can be decided without touching the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        IndexSync Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Presentation (admin UI / console)                  │   │
//! │  │       subscribes to RunState + LogEntry, issues commands        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         indexsync-agent (SyncOrchestrator, HTTP transport)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ indexsync-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ snapshot  │  │ progress  │  │ interrupt │  │   state   │  │   │
//! │  │   │JobSnapshot│  │ processed │  │ classify  │  │ SyncPhase │  │   │
//! │  │   │FinalTotals│  │   total   │  │           │  │ RunState  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                        ┌───────────┐                           │   │
//! │  │                        │    log    │                           │   │
//! │  │                        │  SyncLog  │                           │   │
//! │  │                        └───────────┘                           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO TIMERS • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`snapshot`] - Job executor responses (`JobSnapshot`, `FinalTotals`, envelope parsing)
//! - [`progress`] - Reduces a nested snapshot into `(items_processed, items_total)`
//! - [`interrupt`] - Detects externally forced stops
//! - [`log`] - Dual-track, append-only user-facing log
//! - [`state`] - `SyncStateMachine` and the `RunState` it owns
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use indexsync_core::snapshot::{JobSnapshot, SubJob, SnapshotTotals};
//! use indexsync_core::progress;
//!
//! let snapshot = JobSnapshot {
//!     totals: SnapshotTotals { total: 10 },
//!     current_item: Some(SubJob::in_progress(5, 2)),
//!     pending_stack: vec![SubJob::pending(3), SubJob::pending(2)],
//!     ..Default::default()
//! };
//!
//! assert_eq!(progress::items_total(&snapshot), 20);
//! assert_eq!(progress::items_processed(&snapshot), 12);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod interrupt;
pub mod log;
pub mod progress;
pub mod snapshot;
pub mod state;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use interrupt::Interruption;
pub use log::{LogEntry, LogStatus, SyncLog};
pub use progress::Progress;
pub use snapshot::{FinalTotals, JobOutcome, JobResponse, JobSnapshot, RunMethod, SubJob};
pub use state::{RunState, SyncPhase, SyncStateMachine};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Placeholder `items_total` used before the first snapshot arrives.
///
/// A progress bar rendered against this value reads 0% instead of
/// dividing by zero.
pub const DEFAULT_ITEMS_TOTAL: u64 = 100;
