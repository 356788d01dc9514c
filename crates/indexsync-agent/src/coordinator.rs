//! # Request Coordinator
//!
//! Keeps at most one job-control request current.
//!
//! ## Supersession
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   generation: watch<u64>                                                │
//! │                                                                         │
//! │   send(A) ── ticket 1 ──► in flight ──────────┐                         │
//! │                                               │ generation becomes 2    │
//! │   send(B) ── ticket 2 ──► in flight ──► Ok(Some(response))              │
//! │                                               │                         │
//! │                           A resolves ──► Ok(None)   (never an error)    │
//! │                                                                         │
//! │   cancel_in_flight() bumps the generation without sending anything.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A superseded request is dropped at the await point, which aborts the
//! underlying HTTP exchange. Its ticket is also re-checked after completion
//! so a response racing the supersede is still discarded.

use std::sync::Arc;

use indexsync_core::JobResponse;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::protocol::JobAction;
use crate::transport::JobTransport;

pub struct RequestCoordinator {
    transport: Arc<dyn JobTransport>,
    generation: watch::Sender<u64>,
}

impl RequestCoordinator {
    pub fn new(transport: Arc<dyn JobTransport>) -> Self {
        let (generation, _) = watch::channel(0);
        RequestCoordinator {
            transport,
            generation,
        }
    }

    /// Sends `action`, superseding whatever request is currently in flight.
    ///
    /// Returns `Ok(None)` if this request was itself superseded before its
    /// response could be used.
    pub async fn send(&self, action: JobAction) -> SyncResult<Option<JobResponse>> {
        let ticket = self.supersede();
        let mut watcher = self.generation.subscribe();

        let superseded = async move {
            loop {
                let current = *watcher.borrow_and_update();
                if current != ticket {
                    return;
                }
                if watcher.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        let result = tokio::select! {
            result = self.transport.execute(&action) => result,
            _ = superseded => {
                debug!(%action, ticket, "Request superseded while in flight");
                return Ok(None);
            }
        };

        if !self.is_current(ticket) {
            debug!(%action, ticket, "Discarding response of superseded request");
            return Ok(None);
        }

        let body = result?;
        Ok(Some(JobResponse::from_json(&body)?))
    }

    /// Invalidates the in-flight request, if any, without issuing a new one.
    pub fn cancel_in_flight(&self) {
        let ticket = self.supersede();
        debug!(ticket, "In-flight request cancelled");
    }

    /// Asks the executor to halt the current run. Failures are only logged.
    pub async fn dispatch_cancel(&self) {
        if let Err(err) = self.transport.execute(&JobAction::CancelIndex).await {
            warn!(error = %err, "Cancel command was not delivered");
        }
    }

    /// Returns true if `ticket` belongs to the newest request.
    pub fn is_current(&self, ticket: u64) -> bool {
        *self.generation.borrow() == ticket
    }

    fn supersede(&self) -> u64 {
        let mut ticket = 0;
        self.generation.send_modify(|generation| {
            *generation += 1;
            ticket = *generation;
        });
        ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::testing::{running_body, ScriptedTransport, Step};

    #[tokio::test]
    async fn test_send_parses_response() {
        let transport = ScriptedTransport::new(vec![Step::body(running_body(10, 5, 2))]);
        let coordinator = RequestCoordinator::new(transport.clone());

        let response = coordinator
            .send(JobAction::RunBatch { put_mapping: false })
            .await
            .unwrap()
            .unwrap();
        assert!(!response.is_complete());
        assert_eq!(transport.actions(), vec![JobAction::RunBatch { put_mapping: false }]);
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_older() {
        let (step, gate) = Step::gated(running_body(10, 5, 1));
        let transport =
            ScriptedTransport::new(vec![step, Step::body(running_body(10, 5, 2))]);
        let coordinator = Arc::new(RequestCoordinator::new(transport.clone()));

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.send(JobAction::IndexStatus).await })
        };
        gate.entered.notified().await;

        let second = coordinator.send(JobAction::IndexStatus).await.unwrap();
        assert!(second.is_some());

        let first = first.await.unwrap().unwrap();
        assert!(first.is_none());
    }

    #[tokio::test]
    async fn test_cancel_in_flight_resolves_to_none() {
        let (step, gate) = Step::gated(running_body(10, 5, 1));
        let transport = ScriptedTransport::new(vec![step]);
        let coordinator = Arc::new(RequestCoordinator::new(transport));

        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.send(JobAction::IndexStatus).await })
        };
        gate.entered.notified().await;
        coordinator.cancel_in_flight();

        assert!(pending.await.unwrap().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_errors_are_classified() {
        let transport = ScriptedTransport::new(vec![
            Step::error(SyncError::AuthExpired),
            Step::body("<html>Fatal error</html>"),
        ]);
        let coordinator = RequestCoordinator::new(transport);

        let err = coordinator.send(JobAction::IndexStatus).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthExpired));

        let err = coordinator.send(JobAction::IndexStatus).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_dispatch_cancel_swallows_failures() {
        let transport = ScriptedTransport::new(vec![]);
        transport.fail_cancels();
        let coordinator = RequestCoordinator::new(transport.clone());

        coordinator.dispatch_cancel().await;
        assert_eq!(transport.actions(), vec![JobAction::CancelIndex]);
    }
}
