//! Expansion-state persistence
//!
//! Captures which directories render expanded as root-relative paths and
//! replays them after the next reload. Entries that no longer resolve are
//! skipped.

use crate::error::ApiError;
use crate::state::ViewStateStore;
use crate::store::DirectoryStore;
use crate::tree::NodeTree;
use crate::types::NodeId;
use crate::view::ViewBinding;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Slot name in the host view-state store
pub const EXPANDED_ITEMS_SLOT: &str = "expanded_items";

/// Root-relative locations of expanded rows, in row order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionSet {
    pub paths: Vec<String>,
}

impl ExpansionSet {
    /// Expanded directory rows of the view, top to bottom
    pub fn capture(view: &ViewBinding, tree: &NodeTree) -> Self {
        let paths = view
            .rows()
            .iter()
            .filter(|row| row.is_directory && row.expanded)
            .filter_map(|row| tree.relative_path(row.node))
            .filter_map(|relative| encode(&relative))
            .collect();
        Self { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Write to the store; an empty set removes the slot
    pub fn save(&self, state: &dyn ViewStateStore) -> Result<(), ApiError> {
        if self.is_empty() {
            return state.clear_slot(EXPANDED_ITEMS_SLOT);
        }
        state.store_slot(EXPANDED_ITEMS_SLOT, serde_json::to_value(self)?)
    }

    /// Read from the store; a missing or malformed slot means nothing expanded
    pub fn load(state: &dyn ViewStateStore) -> Self {
        state
            .load_slot(EXPANDED_ITEMS_SLOT)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Resolve each path through the store and expand what resolves.
    ///
    /// Returns the nodes expanded.
    pub fn apply(&self, store: &dyn DirectoryStore, view: &Mutex<ViewBinding>) -> Vec<NodeId> {
        let root = store.tree().read().root_location().to_path_buf();
        let resolved: Vec<NodeId> = self
            .paths
            .iter()
            .filter_map(|relative| {
                let location = decode(&root, relative)?;
                let node = store.lookup(&location);
                if node.is_none() {
                    debug!(path = %relative, "Skipping stale expansion entry");
                }
                node
            })
            .collect();

        let tree = store.tree();
        let tree = tree.read();
        let mut view = view.lock();
        let mut expanded = Vec::new();
        for node in resolved {
            if tree.get(node).is_some_and(|n| n.is_directory()) {
                view.expand(&tree, node);
                expanded.push(node);
            }
        }
        debug!(
            requested = self.paths.len(),
            expanded = expanded.len(),
            "Restored expansion state"
        );
        expanded
    }
}

/// Relative path as '/'-joined components
fn encode(relative: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();
    parts.filter(|p| !p.is_empty()).map(|p| p.join("/"))
}

/// Inverse of [`encode`]; rejects anything that could leave the root
fn decode(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut location = root.to_path_buf();
    for part in relative.split('/').filter(|p| !p.is_empty()) {
        if part == "." || part == ".." {
            return None;
        }
        location.push(part);
    }
    (location != root).then_some(location)
}
