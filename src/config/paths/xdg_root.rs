//! XDG base directories for config and log state.

use crate::error::ApiError;
use std::path::PathBuf;

/// `$XDG_CONFIG_HOME`, else `$HOME/.config`.
pub fn config_home() -> Result<PathBuf, ApiError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }

    let home = std::env::var("HOME").map_err(|_| {
        ApiError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;
    Ok(PathBuf::from(home).join(".config"))
}

pub fn global_config_file() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join("vaultsync").join("config.toml"))
}

/// Platform state directory for the default log file.
pub fn state_dir() -> Result<PathBuf, ApiError> {
    let project_dirs = directories::ProjectDirs::from("", "", "vaultsync").ok_or_else(|| {
        ApiError::ConfigError("Could not determine platform directories".to_string())
    })?;
    Ok(project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf())
}
