//! Environment variable source: VAULTSYNC prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add the environment overlay, e.g. `VAULTSYNC__BACKEND__DEFAULT_NODE_URL`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix("VAULTSYNC")
            .separator("__")
            .try_parsing(true),
    ))
}
