//! Global config file source; optional.

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use tracing::debug;

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg_root::global_config_file() {
        Ok(path) => {
            debug!(path = %path.display(), "Using global config file if present");
            Ok(builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            ))
        }
        Err(_) => Ok(builder),
    }
}
