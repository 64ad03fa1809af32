//! MergeService: stacks the sources in precedence order and deserializes a SyncConfig.

use super::policy;
use crate::config::sources::{environment, global_file};
use crate::config::SyncConfig;
use config::{ConfigError, File, FileFormat};
use std::path::Path;

pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<SyncConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => builder.add_source(File::from(path).format(FileFormat::Toml)),
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load a specific file with the environment overlay, skipping the global file.
    pub fn load_from_file(path: &Path) -> Result<SyncConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
