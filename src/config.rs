//! Configuration
//!
//! Layered configuration for the client: built-in defaults, the global config
//! file, an explicit file, then `VAULTSYNC__SECTION__KEY` environment
//! variables.

pub mod facade;
pub mod merge {
    pub mod policy;
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod sources {
    pub mod environment;
    pub mod global_file;
}

pub use crate::logging::LoggingConfig;
pub use facade::ConfigLoader;

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub sync: SyncPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        let url = self.backend.default_node_url.trim();
        if url.is_empty() {
            return Err(ApiError::ConfigError(
                "backend.default_node_url must not be empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ApiError::ConfigError(format!(
                "backend.default_node_url must be an http(s) URL, got '{}'",
                url
            )));
        }
        if self.backend.request_timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "backend.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.executor.timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "executor.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.sync.ref_save_attempts == 0 {
            return Err(ApiError::ConfigError(
                "sync.ref_save_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_node_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("vaultsync/{}", env!("CARGO_PKG_VERSION"))
}

/// Node endpoints and HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Primary endpoint; new content and uploads always go here
    #[serde(default = "default_node_url")]
    pub default_node_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_node_url: default_node_url(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_executor_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Deadline applied when a call does not pass its own
    #[serde(default = "default_executor_timeout_ms")]
    pub timeout_ms: u64,
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_executor_timeout_ms(),
        }
    }
}

fn default_ref_save_attempts() -> u32 {
    3
}

fn default_ref_save_retry_delay_ms() -> u64 {
    250
}

/// Retry bounds for saving a record's content ref after a content write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    #[serde(default = "default_ref_save_attempts")]
    pub ref_save_attempts: u32,

    #[serde(default = "default_ref_save_retry_delay_ms")]
    pub ref_save_retry_delay_ms: u64,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            ref_save_attempts: default_ref_save_attempts(),
            ref_save_retry_delay_ms: default_ref_save_retry_delay_ms(),
        }
    }
}
