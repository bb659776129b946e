//! StateConfig and resolution of the view-state file.

use crate::config::xdg;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STATE_FILE_NAME: &str = "view-state.json";

/// View-state persistence settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Explicit state file (relative paths are taken from the workspace root).
    /// None means the per-workspace file under the XDG state directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl StateConfig {
    pub fn resolve_state_file(&self, workspace_root: &Path) -> Result<PathBuf, ApiError> {
        match &self.file {
            Some(file) if file.is_absolute() => Ok(file.clone()),
            Some(file) => Ok(workspace_root.join(file)),
            None => Ok(xdg::workspace_state_dir(workspace_root)?.join(STATE_FILE_NAME)),
        }
    }
}
