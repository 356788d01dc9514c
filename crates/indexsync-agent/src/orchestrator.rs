//! # Sync Orchestrator
//!
//! The control loop. Owns the user commands, drives the coordinator, and
//! feeds every response through the state machine.
//!
//! ## Control Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   start(is_deleting) ──► Starting ──► drive loop                        │
//! │                                                                         │
//! │   drive loop:   send(run_batch)                                         │
//! │     ├── superseded            ──► exit quietly                          │
//! │     ├── fatal error           ──► Error, one log entry                  │
//! │     ├── final totals          ──► Complete, summary entry               │
//! │     └── snapshot              ──► update progress, then                 │
//! │           ├── should interrupt ──► Interrupted, one log entry           │
//! │           ├── phase is Paused  ──► "Sync paused", exit                  │
//! │           ├── method is cli    ──► Observing, switch to observe loop    │
//! │           └── otherwise        ──► next batch at once                   │
//! │                                                                         │
//! │   observe loop: send(index_status) every poll interval, same checks,    │
//! │                 never issues run_batch again for this run.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Staleness
//! Each loop carries the epoch it was started under. Responses are applied
//! under the session lock and only while that epoch is current, so a pause
//! requested mid-flight is always seen, and a response that lands after
//! `stop()` or a superseding `resume()` is dropped.

use std::sync::Arc;
use std::time::Duration;

use indexsync_core::interrupt;
use indexsync_core::{
    FinalTotals, JobOutcome, JobResponse, JobSnapshot, LogEntry, LogStatus, RunState, SyncLog,
    SyncPhase, SyncStateMachine,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::AgentConfig;
use crate::coordinator::RequestCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::protocol::JobAction;
use crate::transport::{HttpTransport, JobTransport};

const SYNC_STARTED: &str = "Sync started";
const DELETE_STARTED: &str = "Deleting index and starting sync";
const SYNC_PAUSED: &str = "Sync paused";
const SYNC_STOPPED: &str = "Sync stopped";
const OBSERVING: &str = "A sync started from the command line is in progress. Showing its status.";

// =============================================================================
// Event Emitter
// =============================================================================

/// Receives state and log updates for presentation.
pub trait SyncEventEmitter: Send + Sync {
    /// Emits the full run state after every change.
    fn emit_state(&self, state: &RunState);

    /// Emits each log entry as it is appended.
    fn emit_log(&self, entry: &LogEntry);
}

/// No-op event emitter for headless use and tests.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_state(&self, _state: &RunState) {}
    fn emit_log(&self, _entry: &LogEntry) {}
}

// =============================================================================
// Session
// =============================================================================

/// State and log, always mutated together under one lock.
struct Session {
    machine: SyncStateMachine,
    log: SyncLog,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl Session {
    fn record(&mut self, message: impl Into<String>, status: LogStatus) {
        let entry = self.log.append(message, status, self.machine.is_deleting());
        self.emitter.emit_log(entry);
    }

    fn record_all(&mut self, messages: Vec<String>, status: LogStatus) {
        let is_deleting = self.machine.is_deleting();
        for entry in self.log.append_all(messages, status, is_deleting) {
            self.emitter.emit_log(entry);
        }
    }

    fn publish(&self) {
        self.emitter.emit_state(self.machine.state());
    }

    fn fail(&mut self, err: &SyncError) {
        error!(
            run_id = ?self.machine.state().run_id,
            error = %err,
            "Sync failed"
        );
        self.machine.fail();
        self.record(err.user_message(), LogStatus::Error);
        self.publish();
    }

    /// Applies one accepted response and decides what the loop does next.
    fn apply(&mut self, response: JobResponse, mode: LoopMode) -> SyncResult<Next> {
        if !response.messages.is_empty() {
            self.record_all(response.messages, response.status);
        }

        let snapshot = match response.outcome {
            JobOutcome::Complete(totals) => {
                self.machine.complete(&totals)?;
                info!(
                    run_id = ?self.machine.state().run_id,
                    items_synced = totals.synced,
                    items_failed = totals.failed_count,
                    "Sync complete"
                );
                let (message, status) = completion_summary(&totals);
                self.record(message, status);
                self.publish();
                return Ok(Next::Halt);
            }
            JobOutcome::InProgress(snapshot) => snapshot,
        };

        let progress = self.machine.apply_snapshot(&snapshot)?;
        if !progress.is_consistent() {
            warn!(
                items_processed = progress.items_processed,
                items_total = progress.items_total,
                "Executor reported more processed items than exist"
            );
        }
        debug!(
            items_processed = progress.items_processed,
            items_total = progress.items_total,
            "Progress updated"
        );

        if let Some(interruption) = interrupt::classify(&snapshot, self.machine.is_deleting()) {
            self.machine.interrupt()?;
            if interruption.is_deleting {
                warn!("Delete-and-resync interrupted, index may be incomplete");
            } else {
                info!("Sync interrupted by another process");
            }
            self.record(interruption.message(), interruption.status());
            self.publish();
            return Ok(Next::Halt);
        }

        if self.machine.phase() == SyncPhase::Paused {
            info!("Sync paused");
            self.record(SYNC_PAUSED, LogStatus::Info);
            self.publish();
            return Ok(Next::Halt);
        }

        if matches!(mode, LoopMode::Drive { .. }) && snapshot.method.is_external() {
            self.machine.observe()?;
            info!(method = %snapshot.method, "Run is driven externally, observing");
            self.record(OBSERVING, LogStatus::Info);
            self.publish();
            return Ok(Next::Observe);
        }

        self.publish();
        Ok(Next::Continue)
    }
}

fn completion_summary(totals: &FinalTotals) -> (String, LogStatus) {
    if totals.has_failures() {
        (
            format!(
                "Sync complete with errors: {} synced, {} skipped, {} failed.",
                totals.synced, totals.skipped, totals.failed_count
            ),
            LogStatus::Warning,
        )
    } else {
        (
            format!(
                "Sync complete: {} synced, {} skipped.",
                totals.synced, totals.skipped
            ),
            LogStatus::Success,
        )
    }
}

/// True if a status reply describes no run at all.
fn is_empty_run(snapshot: &JobSnapshot) -> bool {
    snapshot.current_item.is_none()
        && snapshot.pending_stack.is_empty()
        && snapshot.start_date_time.is_none()
}

// =============================================================================
// Loop Control
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopMode {
    /// We issue the batches.
    Drive { is_deleting: bool },
    /// Someone else does; we poll status.
    Observe,
}

impl LoopMode {
    fn action(self) -> JobAction {
        match self {
            LoopMode::Drive { is_deleting } => JobAction::RunBatch {
                put_mapping: is_deleting,
            },
            LoopMode::Observe => JobAction::IndexStatus,
        }
    }
}

enum Next {
    Continue,
    Observe,
    /// Our request was superseded by a stale loop while we are still current.
    Reissue,
    Halt,
}

// =============================================================================
// Orchestrator
// =============================================================================

struct Inner {
    coordinator: RequestCoordinator,
    session: RwLock<Session>,
    poll_interval: Duration,
}

/// Drives sync runs. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with the default HTTP transport.
    pub fn new(config: AgentConfig) -> SyncResult<Self> {
        SyncOrchestratorBuilder::new(config).build()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Begins a new run. Legal from `Idle` and every terminal phase.
    pub async fn start(&self, is_deleting: bool) -> SyncResult<JoinHandle<()>> {
        let epoch = {
            let mut session = self.inner.session.write().await;
            let epoch = session.machine.begin(is_deleting)?;
            info!(
                run_id = ?session.machine.state().run_id,
                epoch,
                is_deleting,
                "Sync started"
            );
            session.record(
                if is_deleting { DELETE_STARTED } else { SYNC_STARTED },
                LogStatus::Info,
            );
            session.publish();
            epoch
        };

        Ok(self.spawn_loop(epoch, LoopMode::Drive { is_deleting }))
    }

    /// Deletes the index and rebuilds it: `start(true)`.
    pub async fn delete_and_sync(&self) -> SyncResult<JoinHandle<()>> {
        self.start(true).await
    }

    /// Withholds the next batch. The in-flight one still lands.
    pub async fn pause(&self) -> SyncResult<()> {
        let mut session = self.inner.session.write().await;
        if session.machine.pause()? {
            info!("Pause requested, halting after the in-flight batch");
            session.publish();
        }
        Ok(())
    }

    /// Re-enters the drive loop, superseding any request still in flight.
    pub async fn resume(&self) -> SyncResult<JoinHandle<()>> {
        let (epoch, is_deleting) = {
            let mut session = self.inner.session.write().await;
            let epoch = session.machine.resume()?;
            info!(run_id = ?session.machine.state().run_id, epoch, "Sync resumed");
            session.publish();
            (epoch, session.machine.is_deleting())
        };

        Ok(self.spawn_loop(epoch, LoopMode::Drive { is_deleting }))
    }

    /// Cancels the run locally, aborts the in-flight request, and asks the
    /// executor to halt. The cancel command's outcome never matters.
    pub async fn stop(&self) -> SyncResult<()> {
        {
            let mut session = self.inner.session.write().await;
            session.machine.cancel()?;
            info!(run_id = ?session.machine.state().run_id, "Sync stopped");
            session.record(SYNC_STOPPED, LogStatus::Info);
            session.publish();
        }

        self.inner.coordinator.cancel_in_flight();
        self.inner.coordinator.dispatch_cancel().await;
        Ok(())
    }

    /// Picks up whatever the executor is doing, after a reload.
    ///
    /// Returns the observe loop's handle if an external run was found. An
    /// unfinished client-driven run is restored as `Paused`.
    pub async fn recover(&self) -> SyncResult<Option<JoinHandle<()>>> {
        {
            let session = self.inner.session.read().await;
            let phase = session.machine.phase();
            if phase != SyncPhase::Idle {
                return Err(SyncError::InvalidCommand {
                    command: "recover",
                    phase,
                });
            }
        }

        let Some(response) = self.inner.coordinator.send(JobAction::IndexStatus).await? else {
            return Ok(None);
        };

        let mut session = self.inner.session.write().await;
        if session.machine.phase() != SyncPhase::Idle {
            debug!("A command ran during recovery, ignoring status");
            return Ok(None);
        }

        match response.outcome {
            JobOutcome::Complete(totals) => {
                session.machine.record_history(&totals);
                info!(last_sync = %totals.end_date_time, "Recovered last sync outcome");
                session.publish();
                Ok(None)
            }
            JobOutcome::InProgress(snapshot) if is_empty_run(&snapshot) => {
                debug!("No run in progress");
                Ok(None)
            }
            JobOutcome::InProgress(snapshot) if snapshot.method.is_external() => {
                let epoch = session.machine.observe_external(&snapshot)?;
                info!(epoch, "Recovered an externally driven run");
                session.record(OBSERVING, LogStatus::Info);
                session.publish();
                drop(session);
                Ok(Some(self.spawn_loop(epoch, LoopMode::Observe)))
            }
            JobOutcome::InProgress(snapshot) => {
                session.machine.restore_paused(&snapshot)?;
                info!(
                    is_deleting = snapshot.is_full_reindex,
                    "Recovered an unfinished run as paused"
                );
                session.publish();
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn state(&self) -> RunState {
        self.inner.session.read().await.machine.state().clone()
    }

    /// Every log entry, both tracks, in order.
    pub async fn log_entries(&self) -> Vec<LogEntry> {
        self.inner.session.read().await.log.entries().to_vec()
    }

    /// Log entries of the normal (`false`) or delete (`true`) track.
    pub async fn log_entries_for(&self, is_deleting: bool) -> Vec<LogEntry> {
        self.inner
            .session
            .read()
            .await
            .log
            .entries_for(is_deleting)
            .cloned()
            .collect()
    }

    pub async fn clear_log(&self) {
        self.inner.session.write().await.log.clear();
    }

    // =========================================================================
    // Loop
    // =========================================================================

    fn spawn_loop(&self, epoch: u64, mode: LoopMode) -> JoinHandle<()> {
        let this = self.clone();
        let span = info_span!("sync_loop", epoch, mode = ?mode);
        tokio::spawn(async move { this.run_loop(epoch, mode).await }.instrument(span))
    }

    async fn run_loop(self, epoch: u64, mut mode: LoopMode) {
        loop {
            if !self.inner.session.read().await.machine.accepts(epoch) {
                debug!("Loop no longer current, not sending");
                return;
            }

            let result = self.inner.coordinator.send(mode.action()).await;

            match self.handle(epoch, mode, result).await {
                Next::Continue => {}
                Next::Reissue => continue,
                Next::Observe => {
                    mode = LoopMode::Observe;
                    continue;
                }
                Next::Halt => return,
            }

            if mode == LoopMode::Observe && !self.inner.poll_interval.is_zero() {
                tokio::time::sleep(self.inner.poll_interval).await;
            }
        }
    }

    async fn handle(
        &self,
        epoch: u64,
        mode: LoopMode,
        result: SyncResult<Option<JobResponse>>,
    ) -> Next {
        let mut session = self.inner.session.write().await;

        if !session.machine.accepts(epoch) {
            debug!(current = session.machine.epoch(), "Discarding response for a stale loop");
            return Next::Halt;
        }

        let response = match result {
            Ok(Some(response)) => response,
            Ok(None) => return Next::Reissue,
            Err(err) => {
                session.fail(&err);
                return Next::Halt;
            }
        };

        match session.apply(response, mode) {
            Ok(next) => next,
            Err(err) => {
                session.fail(&err);
                Next::Halt
            }
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`SyncOrchestrator`].
pub struct SyncOrchestratorBuilder {
    config: AgentConfig,
    transport: Option<Arc<dyn JobTransport>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
    last_sync_date_time: Option<String>,
    last_sync_failed: bool,
}

impl SyncOrchestratorBuilder {
    pub fn new(config: AgentConfig) -> Self {
        SyncOrchestratorBuilder {
            config,
            transport: None,
            emitter: None,
            last_sync_date_time: None,
            last_sync_failed: false,
        }
    }

    /// Replaces the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn JobTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Seeds the outcome of the last finished sync.
    pub fn with_last_sync(mut self, date_time: Option<String>, failed: bool) -> Self {
        self.last_sync_date_time = date_time;
        self.last_sync_failed = failed;
        self
    }

    pub fn build(self) -> SyncResult<SyncOrchestrator> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config)?),
        };
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let session = Session {
            machine: SyncStateMachine::with_history(
                self.last_sync_date_time,
                self.last_sync_failed,
            ),
            log: SyncLog::new(),
            emitter,
        };

        Ok(SyncOrchestrator {
            inner: Arc::new(Inner {
                coordinator: RequestCoordinator::new(transport),
                session: RwLock::new(session),
                poll_interval: self.config.status_poll_interval(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{complete_body, envelope, meta, running_body, ScriptedTransport, Step};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orchestrator(transport: Arc<ScriptedTransport>) -> SyncOrchestrator {
        let mut config = AgentConfig::default();
        config.sync.status_poll_interval_ms = 0;
        SyncOrchestratorBuilder::new(config)
            .with_transport(transport)
            .build()
            .unwrap()
    }

    fn cli_body(total: u64, processed: u64) -> String {
        let mut meta = meta(total, 10, processed);
        meta["method"] = json!("cli");
        envelope(meta)
    }

    fn messages(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[derive(Default)]
    struct CountingEmitter {
        states: AtomicUsize,
        logs: AtomicUsize,
    }

    impl SyncEventEmitter for CountingEmitter {
        fn emit_state(&self, _state: &RunState) {
            self.states.fetch_add(1, Ordering::SeqCst);
        }
        fn emit_log(&self, _entry: &LogEntry) {
            self.logs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let transport = ScriptedTransport::new(vec![
            Step::body(running_body(10, 5, 2)),
            Step::body(running_body(10, 5, 5)),
            Step::body(complete_body(0)),
        ]);
        let emitter = Arc::new(CountingEmitter::default());
        let mut config = AgentConfig::default();
        config.sync.status_poll_interval_ms = 0;
        let sync = SyncOrchestratorBuilder::new(config)
            .with_transport(transport.clone())
            .with_emitter(emitter.clone())
            .build()
            .unwrap();

        sync.start(false).await.unwrap().await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Complete);
        assert!(!state.last_sync_failed);
        assert_eq!(
            state.last_sync_date_time.as_deref(),
            Some("2026-10-19T09:00:00+00:00")
        );
        assert!(state.run_id.is_some());
        assert_eq!(
            transport.actions(),
            vec![JobAction::RunBatch { put_mapping: false }; 3]
        );

        let log = sync.log_entries().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, SYNC_STARTED);
        assert_eq!(log[1].status, LogStatus::Success);

        assert_eq!(emitter.logs.load(Ordering::SeqCst), 2);
        assert!(emitter.states.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_partial_failure_is_a_completion() {
        let transport = ScriptedTransport::new(vec![Step::body(complete_body(3))]);
        let sync = orchestrator(transport);

        sync.start(false).await.unwrap().await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Complete);
        assert!(state.last_sync_failed);

        let log = sync.log_entries().await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].status, LogStatus::Warning);
        assert!(log[1].message.contains("3 failed"));
        assert!(log.iter().all(|e| e.status != LogStatus::Error));
    }

    #[tokio::test]
    async fn test_pause_is_soft() {
        let (step, gate) = Step::gated(running_body(10, 5, 3));
        let transport = ScriptedTransport::new(vec![step]);
        let sync = orchestrator(transport.clone());

        let handle = sync.start(false).await.unwrap();
        gate.entered.notified().await;
        sync.pause().await.unwrap();
        sync.pause().await.unwrap();
        gate.release.notify_one();
        handle.await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Paused);
        assert_eq!(state.items_processed, 13);
        assert_eq!(state.items_total, 15);
        assert_eq!(transport.actions().len(), 1);

        let log = sync.log_entries().await;
        assert_eq!(messages(&log), vec![SYNC_STARTED, SYNC_PAUSED]);
    }

    #[tokio::test]
    async fn test_resume_after_pause_continues() {
        let (step, gate) = Step::gated(running_body(10, 5, 3));
        let transport =
            ScriptedTransport::new(vec![step, Step::body(complete_body(0))]);
        let sync = orchestrator(transport.clone());

        let handle = sync.start(true).await.unwrap();
        gate.entered.notified().await;
        sync.pause().await.unwrap();
        gate.release.notify_one();
        handle.await.unwrap();

        sync.resume().await.unwrap().await.unwrap();

        assert_eq!(sync.state().await.phase, SyncPhase::Complete);
        assert_eq!(
            transport.actions(),
            vec![JobAction::RunBatch { put_mapping: true }; 2]
        );
    }

    #[tokio::test]
    async fn test_repeated_resume_keeps_one_loop() {
        let (step, gate) = Step::gated(running_body(10, 5, 1));
        let transport = ScriptedTransport::new(vec![
            step,
            Step::body(running_body(10, 5, 4)),
            Step::body(complete_body(0)),
        ]);
        let sync = orchestrator(transport.clone());

        let first = sync.start(false).await.unwrap();
        gate.entered.notified().await;
        sync.pause().await.unwrap();

        let second = sync.resume().await.unwrap();
        let third = sync.resume().await.unwrap();
        third.await.unwrap();
        second.await.unwrap();
        first.await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Complete);
        assert_eq!(transport.remaining(), 0);
        assert!(!transport.actions().contains(&JobAction::CancelIndex));

        let log = sync.log_entries().await;
        assert_eq!(log.iter().filter(|e| e.status == LogStatus::Success).count(), 1);
        assert!(!messages(&log).contains(&SYNC_PAUSED));
    }

    #[tokio::test]
    async fn test_cli_run_is_observed_until_complete() {
        let transport = ScriptedTransport::new(vec![
            Step::body(cli_body(10, 2)),
            Step::body(cli_body(10, 6)),
            Step::body(complete_body(0)),
        ]);
        let sync = orchestrator(transport.clone());

        sync.start(false).await.unwrap().await.unwrap();

        assert_eq!(sync.state().await.phase, SyncPhase::Complete);
        assert_eq!(
            transport.actions(),
            vec![
                JobAction::RunBatch { put_mapping: false },
                JobAction::IndexStatus,
                JobAction::IndexStatus,
            ]
        );
        assert!(messages(&sync.log_entries().await).contains(&OBSERVING));
    }

    #[tokio::test]
    async fn test_observing_is_sticky() {
        let (step, gate) = Step::gated(cli_body(10, 4));
        let transport = ScriptedTransport::new(vec![Step::body(cli_body(10, 2)), step]);
        let sync = orchestrator(transport.clone());

        let handle = sync.start(false).await.unwrap();
        gate.entered.notified().await;

        assert_eq!(sync.state().await.phase, SyncPhase::Observing);
        assert!(matches!(
            sync.resume().await,
            Err(SyncError::InvalidCommand { command: "resume", phase: SyncPhase::Observing })
        ));
        assert!(sync.pause().await.is_err());
        assert!(sync.start(false).await.is_err());

        sync.stop().await.unwrap();
        handle.await.unwrap();

        assert_eq!(sync.state().await.phase, SyncPhase::Cancelled);
        assert_eq!(
            transport.actions(),
            vec![
                JobAction::RunBatch { put_mapping: false },
                JobAction::IndexStatus,
                JobAction::CancelIndex,
            ]
        );
    }

    #[tokio::test]
    async fn test_interrupted_delete_run_warns() {
        let mut interrupted = meta(10, 5, 2);
        interrupted["put_mapping"] = json!(true);
        interrupted["should_interrupt_sync"] = json!("1");
        let transport = ScriptedTransport::new(vec![Step::body(envelope(interrupted))]);
        let sync = orchestrator(transport.clone());

        sync.delete_and_sync().await.unwrap().await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Interrupted);
        assert_eq!(state.items_processed, 12);
        assert!(!state.last_sync_failed);

        let log = sync.log_entries_for(true).await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].status, LogStatus::Warning);
        assert!(log[1].message.contains("incomplete"));
        assert!(sync.log_entries_for(false).await.is_empty());
        assert_eq!(transport.actions().len(), 1);
    }

    #[tokio::test]
    async fn test_interruption_message_follows_run_track() {
        let mut interrupted = meta(10, 5, 2);
        interrupted["put_mapping"] = json!(true);
        interrupted["should_interrupt_sync"] = json!(true);
        let transport = ScriptedTransport::new(vec![Step::body(envelope(interrupted))]);
        let sync = orchestrator(transport);

        sync.start(false).await.unwrap().await.unwrap();

        assert_eq!(sync.state().await.phase, SyncPhase::Interrupted);
        assert!(sync.log_entries_for(true).await.is_empty());
        let log = sync.log_entries_for(false).await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].status, LogStatus::Info);
        assert!(!log[1].message.contains("incomplete"));
    }

    #[tokio::test]
    async fn test_auth_expired_is_terminal() {
        let transport = ScriptedTransport::new(vec![
            Step::error(SyncError::AuthExpired),
            Step::body(complete_body(0)),
        ]);
        let sync = orchestrator(transport.clone());

        sync.start(false).await.unwrap().await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Error);
        assert!(!state.last_sync_failed);
        assert_eq!(transport.remaining(), 1);

        let errors: Vec<_> = sync
            .log_entries()
            .await
            .into_iter()
            .filter(|e| e.status == LogStatus::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Reload"));

        assert!(matches!(
            sync.resume().await,
            Err(SyncError::InvalidCommand { command: "resume", phase: SyncPhase::Error })
        ));
        assert!(sync.pause().await.is_err());
        assert_eq!(transport.remaining(), 1);
        assert_eq!(transport.actions().len(), 1);

        // retry is a fresh start
        sync.start(false).await.unwrap().await.unwrap();
        assert_eq!(sync.state().await.phase, SyncPhase::Complete);
    }

    #[tokio::test]
    async fn test_malformed_response_is_fatal() {
        let transport = ScriptedTransport::new(vec![Step::body(
            "<b>Notice</b>: Undefined index {\"data\":{}}",
        )]);
        let sync = orchestrator(transport);

        sync.start(false).await.unwrap().await.unwrap();

        assert_eq!(sync.state().await.phase, SyncPhase::Error);
        let log = sync.log_entries().await;
        assert_eq!(log.last().unwrap().status, LogStatus::Error);
        assert!(log.last().unwrap().message.contains("unexpected response"));
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_response() {
        let (step, gate) = Step::gated(complete_body(0));
        let transport = ScriptedTransport::new(vec![step]);
        transport.fail_cancels();
        let sync = orchestrator(transport.clone());

        let handle = sync.start(false).await.unwrap();
        gate.entered.notified().await;
        sync.stop().await.unwrap();
        gate.release.notify_one();
        handle.await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Cancelled);
        assert!(state.last_sync_date_time.is_none());
        assert_eq!(
            transport.actions(),
            vec![JobAction::RunBatch { put_mapping: false }, JobAction::CancelIndex]
        );
        assert_eq!(
            messages(&sync.log_entries().await),
            vec![SYNC_STARTED, SYNC_STOPPED]
        );
    }

    #[tokio::test]
    async fn test_illegal_commands_send_nothing() {
        let transport = ScriptedTransport::new(vec![]);
        let sync = orchestrator(transport.clone());

        assert!(sync.pause().await.is_err());
        assert!(sync.resume().await.is_err());
        assert!(matches!(
            sync.stop().await,
            Err(SyncError::InvalidCommand { command: "stop", phase: SyncPhase::Idle })
        ));
        assert!(transport.actions().is_empty());
        assert!(sync.log_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_backend_messages_are_logged_in_order() {
        let mut body: serde_json::Value = serde_json::from_str(&running_body(0, 25, 10)).unwrap();
        body["data"]["message"] = json!(["Processed posts 1 - 10 of 25.", ""]);
        body["data"]["status"] = json!("info");
        let transport = ScriptedTransport::new(vec![
            Step::body(body.to_string()),
            Step::body(complete_body(0)),
        ]);
        let sync = orchestrator(transport.clone());

        sync.delete_and_sync().await.unwrap().await.unwrap();

        let log = sync.log_entries().await;
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].message, DELETE_STARTED);
        assert_eq!(log[1].message, "Processed posts 1 - 10 of 25.");
        assert!(log.iter().all(|e| e.is_deleting));
        assert_eq!(
            transport.actions(),
            vec![JobAction::RunBatch { put_mapping: true }; 2]
        );

        sync.clear_log().await;
        assert!(sync.log_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_recover_restores_paused_run() {
        let mut unfinished = meta(10, 5, 2);
        unfinished["put_mapping"] = json!(1);
        let transport = ScriptedTransport::new(vec![
            Step::body(envelope(unfinished)),
            Step::body(complete_body(0)),
        ]);
        let sync = orchestrator(transport.clone());

        assert!(sync.recover().await.unwrap().is_none());
        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Paused);
        assert!(state.is_deleting);
        assert_eq!(state.items_processed, 12);

        sync.resume().await.unwrap().await.unwrap();
        assert_eq!(sync.state().await.phase, SyncPhase::Complete);
        assert_eq!(
            transport.actions(),
            vec![JobAction::IndexStatus, JobAction::RunBatch { put_mapping: true }]
        );
    }

    #[tokio::test]
    async fn test_recover_observes_cli_run() {
        let transport = ScriptedTransport::new(vec![
            Step::body(cli_body(10, 2)),
            Step::body(complete_body(1)),
        ]);
        let sync = orchestrator(transport.clone());

        let handle = sync.recover().await.unwrap().unwrap();
        handle.await.unwrap();

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Complete);
        assert!(state.last_sync_failed);
        assert_eq!(
            transport.actions(),
            vec![JobAction::IndexStatus, JobAction::IndexStatus]
        );
    }

    #[tokio::test]
    async fn test_recover_records_history() {
        let transport = ScriptedTransport::new(vec![Step::body(complete_body(2))]);
        let sync = orchestrator(transport);

        assert!(sync.recover().await.unwrap().is_none());

        let state = sync.state().await;
        assert_eq!(state.phase, SyncPhase::Idle);
        assert!(state.last_sync_failed);
        assert!(state.last_sync_date_time.is_some());
        assert!(sync.log_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_recover_with_nothing_running() {
        let transport = ScriptedTransport::new(vec![Step::body(envelope(json!({})))]);
        let sync = orchestrator(transport);

        assert!(sync.recover().await.unwrap().is_none());
        assert_eq!(sync.state().await.phase, SyncPhase::Idle);
    }

    #[test]
    fn test_history_seed() {
        let transport = ScriptedTransport::new(vec![]);
        let sync = SyncOrchestratorBuilder::new(AgentConfig::default())
            .with_transport(transport)
            .with_last_sync(Some("2026-10-18T10:00:00+00:00".into()), true)
            .build()
            .unwrap();

        let session = sync.inner.session.try_read().unwrap();
        assert!(session.machine.state().last_sync_failed);
        assert_eq!(session.machine.phase(), SyncPhase::Idle);
    }
}
