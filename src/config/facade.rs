//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::SprigConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace from files and environment.
    pub fn load(workspace_root: &Path) -> Result<SprigConfig, ConfigError> {
        MergeService::load(workspace_root)
    }

    /// Load configuration from a specific file with the environment overlay.
    pub fn load_from_file(path: &Path) -> Result<SprigConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    pub fn default() -> SprigConfig {
        SprigConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("sprig.toml");
        fs::write(
            &path,
            r#"
[browser]
show_hidden = true
package_extensions = ["app"]

[reconcile]
batch_window_ms = 10
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert!(config.browser.show_hidden);
        assert_eq!(config.browser.package_extensions, vec!["app".to_string()]);
        assert_eq!(config.browser.notification_capacity, 256);
        assert_eq!(config.reconcile.batch_window_ms, 10);
        assert_eq!(config.reconcile.max_batch_size, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_workspace_file_is_read() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(".sprig.toml"),
            "[reconcile]\nmax_batch_size = 7\n",
        )
        .unwrap();
        let config = ConfigLoader::load(temp.path()).unwrap();
        assert_eq!(config.reconcile.max_batch_size, 7);
    }

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::default();
        assert!(!config.browser.show_hidden);
        assert_eq!(config.browser.package_extensions.len(), 4);
        assert!(config.state.file.is_none());
    }
}
