//! XDG Base Directory utilities.

use crate::error::ApiError;
use std::path::{Component, Path, PathBuf};

const APP_DIR: &str = "sprig";

fn home() -> Result<PathBuf, ApiError> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| ApiError::ConfigError("Could not determine home directory (HOME not set)".to_string()))
}

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, ApiError> {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Ok(home()?.join(".config")),
    }
}

/// Get XDG state home directory
///
/// Returns `$XDG_STATE_HOME` if set, otherwise defaults to `$HOME/.local/state`
pub fn state_home() -> Result<PathBuf, ApiError> {
    match std::env::var("XDG_STATE_HOME") {
        Ok(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Ok(home()?.join(".local").join("state")),
    }
}

/// `$XDG_CONFIG_HOME/sprig/config.toml`
pub fn global_config_file() -> Result<PathBuf, ApiError> {
    Ok(config_home()?.join(APP_DIR).join("config.toml"))
}

/// Get the state directory for a specific workspace
///
/// Returns `$XDG_STATE_HOME/sprig/<workspace_path>/`. The canonical workspace
/// path is used directly as a directory structure, so
/// `/home/user/projects/site` becomes `$XDG_STATE_HOME/sprig/home/user/projects/site/`.
pub fn workspace_state_dir(workspace_root: &Path) -> Result<PathBuf, ApiError> {
    let canonical = dunce::canonicalize(workspace_root).map_err(|e| {
        ApiError::ConfigError(format!("Failed to canonicalize workspace path: {}", e))
    })?;
    Ok(nest_under(state_home()?.join(APP_DIR), &canonical))
}

fn nest_under(base: PathBuf, path: &Path) -> PathBuf {
    path.components().fold(base, |dir, component| match component {
        Component::Normal(name) => dir.join(name),
        _ => dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nest_under_drops_root_and_prefix() {
        let nested = nest_under(PathBuf::from("/state/sprig"), Path::new("/home/user/site"));
        assert_eq!(nested, PathBuf::from("/state/sprig/home/user/site"));
    }

    #[test]
    fn test_workspace_state_dir_mirrors_workspace() {
        let temp = tempfile::tempdir().unwrap();
        let dir = workspace_state_dir(temp.path()).unwrap();
        let canonical = dunce::canonicalize(temp.path()).unwrap();
        assert!(dir.ends_with(canonical.file_name().unwrap()));
        assert!(dir.to_string_lossy().contains(APP_DIR));
    }
}
