//! Environment variable source: SPRIG__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `SPRIG__BROWSER__SHOW_HIDDEN=true` sets `browser.show_hidden`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("SPRIG")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
