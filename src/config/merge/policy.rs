//! Merge policy: every layer starts from the serialized defaults.

use crate::config::SprigConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with `SprigConfig::default()` so partial files deserialize.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&SprigConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
