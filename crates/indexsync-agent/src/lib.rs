//! # indexsync-agent: Job-Control Client
//!
//! Drives index synchronization runs against a remote job executor.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          indexsync-agent                                │
//! │                                                                         │
//! │   user commands                                                         │
//! │   start / pause / resume / stop / recover                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌──────────────────┐   one request    ┌──────────────────┐            │
//! │   │ SyncOrchestrator │ ───────────────► │RequestCoordinator│            │
//! │   │  drive loop      │ ◄─────────────── │ newest supersedes│            │
//! │   │  observe loop    │  Option<response>└────────┬─────────┘            │
//! │   └────────┬─────────┘                           │                      │
//! │            │                                     ▼                      │
//! │            ▼                            ┌──────────────────┐            │
//! │   SyncStateMachine + SyncLog            │  JobTransport    │──► HTTP    │
//! │   (indexsync-core)                      │  (form POST)     │            │
//! │            │                            └──────────────────┘            │
//! │            ▼                                                            │
//! │   SyncEventEmitter (UI / console)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use indexsync_agent::{AgentConfig, SyncOrchestrator};
//!
//! let config = AgentConfig::load(None)?;
//! let sync = SyncOrchestrator::new(config)?;
//!
//! if sync.recover().await?.is_none() {
//!     sync.start(false).await?.await?;
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{AgentConfig, EndpointSettings, SyncSettings};
pub use coordinator::RequestCoordinator;
pub use error::{SyncError, SyncResult};
pub use orchestrator::{NoOpEmitter, SyncEventEmitter, SyncOrchestrator, SyncOrchestratorBuilder};
pub use protocol::JobAction;
pub use transport::{HttpTransport, JobTransport};
