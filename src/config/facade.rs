//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::paths::xdg_root;
use super::SyncConfig;
use config::ConfigError;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Path of the global config file (`<config home>/vaultsync/config.toml`).
    pub fn global_config_path() -> Option<PathBuf> {
        xdg_root::global_config_file().ok()
    }

    /// Load configuration from defaults, the global file, `explicit` and the environment.
    pub fn load(explicit: Option<&Path>) -> Result<SyncConfig, ConfigError> {
        MergeService::load(explicit)
    }

    /// Load configuration from a specific file plus the environment overlay.
    pub fn load_from_file(path: &Path) -> Result<SyncConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    pub fn default() -> SyncConfig {
        SyncConfig::default()
    }
}
