//! # Job Transport
//!
//! Carries one [`JobAction`] to the job executor and classifies the HTTP
//! outcome.
//!
//! ## Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     HTTP Outcome Classification                         │
//! │                                                                         │
//! │   2xx            ──► Ok(body)          parsed later by the coordinator  │
//! │   403            ──► AuthExpired       session or nonce expired         │
//! │   other status   ──► UnexpectedResponse { status, body }                │
//! │   no status      ──► RequestFailed     refused, reset, client timeout   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The trait is the seam between the control loop and the network, so the
//! orchestrator can be driven by a scripted transport in tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::config::AgentConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::JobAction;

/// Raw bodies longer than this are cut before they reach a log line.
const MAX_LOGGED_BODY: usize = 2048;

/// Sends job-control requests.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Executes one request and returns the body of a 2xx response.
    async fn execute(&self, action: &JobAction) -> SyncResult<String>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// Form-POST transport over `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    nonce: String,
}

impl HttpTransport {
    /// Builds a transport from the endpoint section of the config.
    pub fn new(config: &AgentConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.endpoint.user_agent.as_str())
            .build()?;

        Ok(HttpTransport {
            client,
            endpoint: config.endpoint_url()?,
            nonce: config.endpoint.nonce.clone(),
        })
    }
}

#[async_trait]
impl JobTransport for HttpTransport {
    async fn execute(&self, action: &JobAction) -> SyncResult<String> {
        debug!(%action, endpoint = %self.endpoint, "Sending job-control request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&action.form_fields(&self.nonce))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::FORBIDDEN {
            warn!(%action, "Job-control request rejected with 403");
            return Err(SyncError::AuthExpired);
        }

        if !status.is_success() {
            warn!(%action, status = status.as_u16(), "Job-control request failed");
            return Err(SyncError::UnexpectedResponse {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        Ok(body)
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_LOGGED_BODY {
        let mut cut = MAX_LOGGED_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
