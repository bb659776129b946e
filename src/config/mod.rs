//! Configuration
//!
//! Layered with the `config` crate. Precedence, lowest first: built-in
//! defaults, the global file (`$XDG_CONFIG_HOME/sprig/config.toml`), the
//! workspace file (`<root>/.sprig.toml`), then `SPRIG__SECTION__KEY`
//! environment variables.

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
    pub mod workspace_file;
}
pub mod state_paths;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use state_paths::StateConfig;

use crate::logging::LoggingConfig;
use crate::reconcile::ReconcileConfig;
use crate::tree::ScanConfig;
use serde::{Deserialize, Serialize};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SprigConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Browser settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Include dot-prefixed entries in the view
    #[serde(default)]
    pub show_hidden: bool,

    /// Directory extensions shown as opaque packages
    #[serde(default = "default_package_extensions")]
    pub package_extensions: Vec<String>,

    /// Buffered notifications per subscriber before it lags
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

fn default_package_extensions() -> Vec<String> {
    ScanConfig::default().package_extensions
}

fn default_notification_capacity() -> usize {
    256
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            show_hidden: false,
            package_extensions: default_package_extensions(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl BrowserConfig {
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            package_extensions: self.package_extensions.clone(),
        }
    }
}
