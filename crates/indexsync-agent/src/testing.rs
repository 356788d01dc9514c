//! Scripted transport for driving the coordinator and orchestrator in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::error::{SyncError, SyncResult};
use crate::protocol::JobAction;
use crate::transport::JobTransport;

/// Holds a scripted request in flight until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

enum Reply {
    Body(String),
    Error(SyncError),
}

pub struct Step {
    reply: Reply,
    gate: Option<Arc<Gate>>,
}

impl Step {
    pub fn body(body: impl Into<String>) -> Self {
        Step {
            reply: Reply::Body(body.into()),
            gate: None,
        }
    }

    pub fn error(err: SyncError) -> Self {
        Step {
            reply: Reply::Error(err),
            gate: None,
        }
    }

    pub fn gated(body: impl Into<String>) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let step = Step {
            reply: Reply::Body(body.into()),
            gate: Some(gate.clone()),
        };
        (step, gate)
    }
}

/// Answers requests from a script, in order. Cancel commands are
/// acknowledged without consuming the script.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    actions: Mutex<Vec<JobAction>>,
    cancel_fails: AtomicBool,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            script: Mutex::new(steps.into()),
            actions: Mutex::new(Vec::new()),
            cancel_fails: AtomicBool::new(false),
        })
    }

    pub fn fail_cancels(&self) {
        self.cancel_fails.store(true, Ordering::SeqCst);
    }

    /// Every action received so far, cancels included.
    pub fn actions(&self) -> Vec<JobAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl JobTransport for ScriptedTransport {
    async fn execute(&self, action: &JobAction) -> SyncResult<String> {
        self.actions.lock().unwrap().push(*action);

        if *action == JobAction::CancelIndex {
            if self.cancel_fails.load(Ordering::SeqCst) {
                return Err(SyncError::RequestFailed("connection reset".into()));
            }
            return Ok("{\"success\":true}".into());
        }

        let step = self.script.lock().unwrap().pop_front();
        let Some(step) = step else {
            return Err(SyncError::RequestFailed("script exhausted".into()));
        };

        if let Some(gate) = step.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        match step.reply {
            Reply::Body(body) => Ok(body),
            Reply::Error(err) => Err(err),
        }
    }
}

// =============================================================================
// Response Bodies
// =============================================================================

/// `index_meta` of a normal run with one sub-job in progress.
pub fn meta(total: u64, target: u64, processed: u64) -> Value {
    json!({
        "method": "web",
        "put_mapping": false,
        "totals": { "total": total },
        "current_sync_item": {
            "found_items": target,
            "synced": processed,
            "skipped": 0,
            "failed": 0
        },
        "sync_stack": [],
        "start_date_time": "2026-10-19T08:00:00+00:00",
        "should_interrupt_sync": false
    })
}

/// A running-form envelope around `meta`.
pub fn envelope(meta: Value) -> String {
    json!({ "data": { "totals": [], "index_meta": meta } }).to_string()
}

pub fn running_body(total: u64, target: u64, processed: u64) -> String {
    envelope(meta(total, target, processed))
}

pub fn complete_body(failed: u64) -> String {
    json!({
        "data": {
            "totals": {
                "end_date_time": "2026-10-19T09:00:00+00:00",
                "failed": failed,
                "total": 20,
                "synced": 20 - failed,
                "skipped": 0
            }
        }
    })
    .to_string()
}
