//! # Agent Configuration
//!
//! Configuration management for the job-control client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     INDEXSYNC_ENDPOINT_URL=https://example.com/wp-admin/admin-ajax.php │
//! │     INDEXSYNC_NONCE=4f2a9c...                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/indexsync/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.indexsync.indexsync/sync.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [endpoint]
//! url = "https://example.com/wp-admin/admin-ajax.php"
//! nonce = "4f2a9c0e1b"
//! request_timeout_secs = 120
//!
//! [sync]
//! status_poll_interval_ms = 1000
//! auto_resume = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Endpoint Settings
// =============================================================================

/// Where and how to reach the job executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// Job-control endpoint (http or https).
    #[serde(default)]
    pub url: Option<String>,

    /// Auth token sent with every request.
    #[serde(default)]
    pub nonce: String,

    /// Client-side request timeout (seconds).
    /// A request that exceeds it fails the run like any other bad response.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout() -> u64 {
    120
}

fn default_user_agent() -> String {
    format!("indexsync/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for EndpointSettings {
    fn default() -> Self {
        EndpointSettings {
            url: None,
            nonce: String::new(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Control loop behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Delay between status polls while observing an external run
    /// (milliseconds). Batches of a client-driven run are never delayed.
    #[serde(default = "default_status_poll_interval")]
    pub status_poll_interval_ms: u64,

    /// Resume an unfinished run found during recovery instead of leaving
    /// it paused.
    #[serde(default)]
    pub auto_resume: bool,
}

fn default_status_poll_interval() -> u64 {
    1000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            status_poll_interval_ms: default_status_poll_interval(),
            auto_resume: false,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub endpoint: EndpointSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// A missing endpoint is allowed here (status-only tooling may not need
    /// one); [`AgentConfig::endpoint_url`] rejects it when a request is built.
    pub fn validate(&self) -> SyncResult<()> {
        if let Some(ref raw) = self.endpoint.url {
            parse_endpoint(raw)?;
        }

        if self.endpoint.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("INDEXSYNC_ENDPOINT_URL") {
            debug!(url = %url, "Overriding endpoint URL from environment");
            self.endpoint.url = Some(url);
        }

        if let Ok(nonce) = std::env::var("INDEXSYNC_NONCE") {
            self.endpoint.nonce = nonce;
        }

        if let Ok(timeout) = std::env::var("INDEXSYNC_REQUEST_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.endpoint.request_timeout_secs = secs,
                Err(_) => warn!(value = %timeout, "Ignoring invalid request timeout in environment"),
            }
        }

        if let Ok(interval) = std::env::var("INDEXSYNC_STATUS_POLL_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => self.sync.status_poll_interval_ms = ms,
                Err(_) => warn!(value = %interval, "Ignoring invalid poll interval in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "indexsync", "indexsync")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the parsed endpoint, or an error if none is configured.
    pub fn endpoint_url(&self) -> SyncResult<Url> {
        let raw = self
            .endpoint
            .url
            .as_deref()
            .ok_or_else(|| SyncError::InvalidConfig("Endpoint URL required for sync".into()))?;
        parse_endpoint(raw)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.request_timeout_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync.status_poll_interval_ms)
    }
}

fn parse_endpoint(raw: &str) -> SyncResult<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::InvalidUrl(format!(
            "Endpoint URL must use http:// or https://, got {}://",
            other
        ))),
    }
}
