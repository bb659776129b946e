//! Directory scanning into a [`NodeTree`]

use super::arena::NodeTree;
use super::node::{NodeEntry, NodeKind};
use crate::error::FsError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory extensions presented as opaque packages
    pub package_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            package_extensions: vec![
                "app".to_string(),
                "bundle".to_string(),
                "framework".to_string(),
                "plugin".to_string(),
            ],
        }
    }
}

/// Resolve links in the directories leading to `path`, keeping its last
/// component as given so an alias names itself, not its target.
///
/// Falls back to `path` unchanged when it cannot be resolved.
pub fn canonical_location(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => dunce::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Builds node trees from the filesystem
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Read the node metadata for a single path without following links
    pub fn entry_for(&self, path: &Path) -> Result<NodeEntry, FsError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| FsError::from_io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FsError::InvalidName(path.to_string_lossy().into_owned()))?;
        let file_type = metadata.file_type();

        let (kind, alias_target) = if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| FsError::from_io(path, e))?;
            let target = if target.is_relative() {
                path.parent().map(|p| p.join(&target)).unwrap_or(target)
            } else {
                target
            };
            (NodeKind::Alias, Some(target))
        } else if file_type.is_dir() {
            if self.is_package(path) {
                (NodeKind::Package, None)
            } else {
                (NodeKind::Directory, None)
            }
        } else {
            (NodeKind::File, None)
        };

        Ok(NodeEntry {
            name,
            kind,
            writable: !metadata.permissions().readonly(),
            alias_target,
        })
    }

    fn is_package(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.config
                    .package_extensions
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }

    /// Scan a directory into a fresh tree rooted at it
    pub fn scan(&self, root: &Path) -> Result<NodeTree, FsError> {
        let metadata = fs::metadata(root).map_err(|e| FsError::from_io(root, e))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(root.to_path_buf()));
        }
        let mut tree = NodeTree::new(root, !metadata.permissions().readonly());
        let added = self.populate(&mut tree, root, false)?;
        debug!(root = ?root, nodes = added + 1, "Scanned directory");
        Ok(tree)
    }

    /// Walk `start` and insert what is found under its parent node in `tree`.
    ///
    /// With `include_start` the start path itself becomes a new node (used
    /// after copying an item into the tree); otherwise only its contents are
    /// added. Unreadable entries are skipped with a warning. Each directory's
    /// entries are appended as they are walked and sorted once at the end.
    pub(crate) fn populate(
        &self,
        tree: &mut NodeTree,
        start: &Path,
        include_start: bool,
    ) -> Result<usize, FsError> {
        let offset = usize::from(!include_start);
        let base_location = if include_start { start.parent() } else { Some(start) };
        let base = base_location
            .and_then(|p| tree.locate(p))
            .ok_or_else(|| FsError::NotFound(start.to_path_buf()))?;

        // parents[d] is the directory node holding entries at walk depth d + offset
        let mut parents = vec![base];
        let mut touched = if include_start { Vec::new() } else { vec![base] };
        let mut added = 0;
        let mut entries = WalkDir::new(start)
            .follow_links(false)
            .min_depth(offset)
            .into_iter();
        while let Some(result) = entries.next() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let level = entry.depth() - offset;
            parents.truncate(level + 1);
            let Some(&parent) = parents.get(level) else {
                continue;
            };
            let path = entry.path();
            let node_entry = match self.entry_for(path) {
                Ok(node_entry) => node_entry,
                Err(e) if entry.depth() > 0 => {
                    warn!(path = ?path, error = %e, "Skipping entry");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let kind = node_entry.kind;
            let inserted = if entry.depth() == 0 {
                tree.insert_child(parent, node_entry)
            } else {
                tree.append_child(parent, node_entry)
            };
            let id = match inserted {
                Ok(id) => id,
                Err(e @ FsError::NameCollision(_)) if entry.depth() > 0 => {
                    warn!(path = ?path, error = %e, "Skipping entry");
                    if entry.file_type().is_dir() {
                        entries.skip_current_dir();
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            added += 1;
            match kind {
                NodeKind::Directory => {
                    parents.push(id);
                    touched.push(id);
                }
                NodeKind::Package if entry.file_type().is_dir() => entries.skip_current_dir(),
                _ => {}
            }
        }
        for directory in touched {
            tree.sort_children(directory);
        }
        Ok(added)
    }
}
