//! Lowest-precedence layer: the built-in defaults.

use crate::config::SyncConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&SyncConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
