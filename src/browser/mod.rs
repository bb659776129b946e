//! Browser operations: create, rename, duplicate, move, copy and delete.
//!
//! Each operation is a thin orchestration over the directory store: call the
//! store, and on success apply the minimal view update at the affected
//! parent's post-mutation child index. Single-target operations stop at the
//! first failure; batch operations report per-item failures and continue.

pub mod commands;

pub use commands::{Command, CommandOutcome, SelectionAction};

use crate::dnd::{DragPayload, DragSession, OperationMask};
use crate::error::FsError;
use crate::store::{DirectoryStore, SharedTree};
use crate::tree::{canonical_location, NodeTree};
use crate::types::NodeId;
use crate::view::{Animation, ViewBinding};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Base names for newly created entries
pub const UNTITLED_FILE: &str = "untitled";
pub const UNTITLED_FOLDER: &str = "untitled folder";

/// Shared handle to the view a browser drives
pub type SharedView = Arc<Mutex<ViewBinding>>;

/// One item of a batch that the store refused
#[derive(Debug)]
pub struct ItemFailure {
    pub location: PathBuf,
    pub error: FsError,
}

/// Result of a batch operation; items commit independently
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub completed: Vec<NodeId>,
    /// Items that needed no work (already in place, or covered by an ancestor)
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<ItemFailure>,
}

impl BatchOutcome {
    /// At least one item succeeded
    pub fn succeeded(&self) -> bool {
        !self.completed.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn absorb(&mut self, other: BatchOutcome) {
        self.completed.extend(other.completed);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }

    fn fail(&mut self, operation: &str, location: PathBuf, error: FsError) {
        warn!(operation, location = ?location, error = %error, "Item failed");
        self.failed.push(ItemFailure { location, error });
    }
}

/// A file browser over one directory store and its view
pub struct Browser {
    store: Arc<dyn DirectoryStore>,
    view: SharedView,
}

impl Browser {
    pub fn new(store: Arc<dyn DirectoryStore>, show_hidden: bool) -> Self {
        let view = {
            let tree = store.tree();
            let tree = tree.read();
            ViewBinding::new(&tree, show_hidden)
        };
        Self {
            store,
            view: Arc::new(Mutex::new(view)),
        }
    }

    pub fn store(&self) -> &Arc<dyn DirectoryStore> {
        &self.store
    }

    pub fn tree(&self) -> SharedTree {
        self.store.tree()
    }

    pub fn view(&self) -> SharedView {
        Arc::clone(&self.view)
    }

    /// Run `f` with the tree read-locked, then the view locked
    pub fn with_view<R>(&self, f: impl FnOnce(&NodeTree, &mut ViewBinding) -> R) -> R {
        let tree = self.store.tree();
        let tree = tree.read();
        let mut view = self.view.lock();
        f(&tree, &mut view)
    }

    pub fn set_show_hidden(&self, show_hidden: bool) {
        self.with_view(|tree, view| view.set_show_hidden(tree, show_hidden));
    }

    pub fn expand(&self, node: NodeId) -> bool {
        self.with_view(|tree, view| view.expand(tree, node))
    }

    pub fn collapse(&self, node: NodeId) -> bool {
        self.with_view(|tree, view| view.collapse(tree, node))
    }

    pub fn select(&self, nodes: &[NodeId]) {
        self.view.lock().select(nodes);
    }

    pub fn selection(&self) -> Vec<NodeId> {
        self.view.lock().selection().to_vec()
    }

    /// Directory that receives new items for a context node.
    ///
    /// A directory receives them itself, any other node its parent, no node the root.
    pub fn target_directory(&self, context: Option<NodeId>) -> NodeId {
        let tree = self.store.tree();
        let tree = tree.read();
        context
            .and_then(|id| tree.get(id))
            .and_then(|node| {
                if node.is_directory() {
                    Some(node.id())
                } else {
                    node.parent()
                }
            })
            .unwrap_or_else(|| tree.root())
    }

    pub fn create_file(&self, parent: NodeId) -> Result<NodeId, FsError> {
        self.create(parent, false)
    }

    pub fn create_folder(&self, parent: NodeId) -> Result<NodeId, FsError> {
        self.create(parent, true)
    }

    /// Create an untitled entry, show it selected and in rename mode
    fn create(&self, parent: NodeId, folder: bool) -> Result<NodeId, FsError> {
        let stem = if folder { UNTITLED_FOLDER } else { UNTITLED_FILE };
        let name = {
            let tree = self.store.tree();
            let tree = tree.read();
            tree.unique_child_name(parent, stem, None)
        };
        self.reveal(parent);

        let created = if folder {
            self.store.create_folder(parent, &name)
        } else {
            self.store.create_file(parent, &name)
        };
        let node = created.map_err(|e| {
            warn!(parent = %parent, name = %name, error = %e, "Create failed");
            e
        })?;

        self.with_view(|tree, view| {
            if let Some(index) = view.child_index(tree, node) {
                view.insert(tree, parent, index, node, Animation::Slide);
                view.select(&[node]);
                view.begin_rename(node);
            }
        });
        info!(node = %node, name = %name, folder, "Created entry");
        Ok(node)
    }

    /// Expand `node` and its ancestors so its children have rows
    fn reveal(&self, node: NodeId) {
        self.with_view(|tree, view| {
            for id in tree.lineage(node) {
                view.expand(tree, id);
            }
        });
    }

    /// Rename a node in place.
    ///
    /// Returns `Ok(false)` without calling the store when the name is unchanged.
    /// On failure the previously displayed name is restored.
    pub fn rename(&self, node: NodeId, new_name: &str) -> Result<bool, FsError> {
        let (parent, old_index, current) = {
            let tree = self.store.tree();
            let tree = tree.read();
            let entry = tree.get(node).ok_or(FsError::StaleNode(node))?;
            let view = self.view.lock();
            (entry.parent(), view.child_index(&tree, node), entry.name().to_string())
        };
        let original = {
            let mut view = self.view.lock();
            match view.end_rename() {
                Some(session) if session.node == node => session.original,
                _ => current.clone(),
            }
        };
        if new_name == current {
            debug!(node = %node, "Rename to the same name skipped");
            return Ok(false);
        }

        if let Err(e) = self.store.rename(node, new_name) {
            warn!(node = %node, name = %new_name, error = %e, "Rename failed");
            self.view.lock().restore_label(node, &original);
            return Err(e);
        }

        self.with_view(|tree, view| {
            let new_index = view.child_index(tree, node);
            match (parent, old_index, new_index) {
                (Some(parent), Some(from), Some(to)) if from != to => {
                    view.move_item(tree, node, parent, from, parent, to, Animation::None);
                }
                (Some(_), Some(_), Some(_)) => view.relabel(tree, node),
                _ => view.reload(tree),
            }
        });
        info!(node = %node, from = %current, to = %new_name, "Renamed entry");
        Ok(true)
    }

    /// Duplicate each node beside itself
    pub fn duplicate_items(&self, nodes: &[NodeId]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for &node in nodes {
            let Some(location) = self.location_of(node) else {
                outcome.fail("duplicate", PathBuf::new(), FsError::StaleNode(node));
                continue;
            };
            match self.store.duplicate(node) {
                Ok(copy) => {
                    self.show_inserted(copy);
                    outcome.completed.push(copy);
                }
                Err(e) => outcome.fail("duplicate", location, e),
            }
        }
        if outcome.succeeded() {
            self.select(&outcome.completed);
        }
        outcome
    }

    /// Delete nodes; failures are reported and the batch continues
    pub fn delete_items(&self, nodes: &[NodeId]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for node in self.outermost(nodes, &mut outcome) {
            let Some((location, parent, index)) = self.placement(node) else {
                outcome.fail("delete", PathBuf::new(), FsError::StaleNode(node));
                continue;
            };
            match self.store.delete(node) {
                Ok(()) => {
                    if let (Some(parent), Some(index)) = (parent, index) {
                        self.with_view(|tree, view| {
                            view.remove(tree, parent, index, node, Animation::Fade)
                        });
                    }
                    outcome.completed.push(node);
                }
                Err(e) => outcome.fail("delete", location, e),
            }
        }
        info!(
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            "Delete batch finished"
        );
        outcome
    }

    /// Move nodes into `target`; items already there are skipped
    pub fn move_items(&self, nodes: &[NodeId], target: NodeId) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for node in self.outermost(nodes, &mut outcome) {
            let Some((location, parent, from_index)) = self.placement(node) else {
                outcome.fail("move", PathBuf::new(), FsError::StaleNode(node));
                continue;
            };
            let Some(parent) = parent else {
                outcome.fail("move", location.clone(), FsError::NotWritable(location));
                continue;
            };
            if parent == target {
                outcome.skipped.push(location);
                continue;
            }
            match self.store.move_node(node, target) {
                Ok(moved) => {
                    self.with_view(|tree, view| {
                        match (from_index, view.child_index(tree, moved)) {
                            (Some(from), Some(to)) => {
                                view.move_item(tree, moved, parent, from, target, to, Animation::Slide);
                            }
                            (Some(from), None) => {
                                view.remove(tree, parent, from, moved, Animation::Slide);
                            }
                            (None, Some(to)) => {
                                view.insert(tree, target, to, moved, Animation::Slide);
                            }
                            (None, None) => {}
                        }
                    });
                    outcome.completed.push(moved);
                }
                Err(e) => outcome.fail("move", location, e),
            }
        }
        info!(
            completed = outcome.completed.len(),
            skipped = outcome.skipped.len(),
            failed = outcome.failed.len(),
            "Move batch finished"
        );
        outcome
    }

    /// Copy locations (inside or outside the tree) into `target`
    pub fn copy_items(&self, sources: &[PathBuf], target: NodeId) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for source in sources {
            match self.store.copy(source, target) {
                Ok(copy) => {
                    self.show_inserted(copy);
                    outcome.completed.push(copy);
                }
                Err(e) => outcome.fail("copy", source.clone(), e),
            }
        }
        info!(
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            "Copy batch finished"
        );
        outcome
    }

    /// Start a drag of `nodes` from this view
    pub fn begin_drag(&self, nodes: &[NodeId], operations: OperationMask) -> DragSession {
        let sources = {
            let tree = self.store.tree();
            let tree = tree.read();
            nodes
                .iter()
                .filter_map(|id| tree.get(*id).map(|n| n.location().to_path_buf()))
                .collect()
        };
        DragSession::new(DragPayload::internal(sources, operations))
    }

    /// Resolve locations to nodes, recording the ones that are gone
    pub(crate) fn resolve(&self, locations: &[PathBuf], outcome: &mut BatchOutcome) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(locations.len());
        for location in locations {
            let node = self
                .store
                .lookup(location)
                .or_else(|| self.store.lookup(&canonical_location(location)));
            match node {
                Some(node) => nodes.push(node),
                None => outcome.fail("resolve", location.clone(), FsError::NotFound(location.clone())),
            }
        }
        nodes
    }

    fn show_inserted(&self, node: NodeId) {
        self.with_view(|tree, view| {
            let parent = tree.get(node).and_then(|n| n.parent());
            if let (Some(parent), Some(index)) = (parent, view.child_index(tree, node)) {
                view.insert(tree, parent, index, node, Animation::Slide);
            }
        });
    }

    fn location_of(&self, node: NodeId) -> Option<PathBuf> {
        let tree = self.store.tree();
        let tree = tree.read();
        tree.get(node).map(|n| n.location().to_path_buf())
    }

    /// Location, parent and visible index of a node before it is mutated
    fn placement(&self, node: NodeId) -> Option<(PathBuf, Option<NodeId>, Option<usize>)> {
        self.with_view(|tree, view| {
            let entry = tree.get(node)?;
            Some((
                entry.location().to_path_buf(),
                entry.parent(),
                view.child_index(tree, node),
            ))
        })
    }

    /// Drop nodes whose ancestor is also in the batch; they travel with it
    fn outermost(&self, nodes: &[NodeId], outcome: &mut BatchOutcome) -> Vec<NodeId> {
        let tree = self.store.tree();
        let tree = tree.read();
        let requested: HashSet<NodeId> = nodes.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(nodes.len());
        for &node in nodes {
            if !seen.insert(node) {
                continue;
            }
            let covered = tree
                .ancestors(node)
                .into_iter()
                .skip(1)
                .any(|ancestor| requested.contains(&ancestor));
            if covered {
                if let Some(entry) = tree.get(node) {
                    outcome.skipped.push(entry.location().to_path_buf());
                }
            } else {
                kept.push(node);
            }
        }
        kept
    }
}

/// Convenience for hosts that hold locations rather than ids
pub fn locations_of(tree: &NodeTree, nodes: &[NodeId]) -> Vec<PathBuf> {
    nodes
        .iter()
        .filter_map(|id| tree.get(*id).map(|n| n.location().to_path_buf()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsDirectoryStore;
    use crate::tree::ScanConfig;
    use crate::view::ViewUpdate;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn open() -> (TempDir, Browser, PathBuf) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("A/B")).unwrap();
        fs::write(temp.path().join("A/a.txt"), "a").unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();
        let store = FsDirectoryStore::open(temp.path(), ScanConfig::default(), 64).unwrap();
        let root = store.root_location();
        (temp, Browser::new(Arc::new(store), false), root)
    }

    fn id(browser: &Browser, path: &Path) -> NodeId {
        browser.store().lookup(path).unwrap()
    }

    #[test]
    fn test_create_folder_in_collapsed_parent_reveals_it() {
        let (_temp, browser, root) = open();
        let a = id(&browser, &root.join("A"));
        let node = browser.create_folder(a).unwrap();

        assert!(root.join("A/untitled folder").is_dir());
        let view = browser.view();
        let mut view = view.lock();
        assert!(view.is_expanded(a));
        assert_eq!(view.selection(), &[node]);
        assert_eq!(view.editing().map(|s| s.node), Some(node));
        let inserts = view
            .take_updates()
            .into_iter()
            .filter(|u| matches!(u, ViewUpdate::Insert { .. }))
            .count();
        assert_eq!(inserts, 1);
    }

    #[test]
    fn test_create_numbers_untitled_names() {
        let (_temp, browser, root) = open();
        let root_id = browser.tree().read().root();
        browser.create_file(root_id).unwrap();
        browser.create_file(root_id).unwrap();
        assert!(root.join("untitled").is_file());
        assert!(root.join("untitled 2").is_file());
    }

    #[test]
    fn test_rename_unchanged_skips_store() {
        let (_temp, browser, root) = open();
        let b = id(&browser, &root.join("b.txt"));
        assert!(!browser.rename(b, "b.txt").unwrap());
        assert!(browser.view().lock().take_updates().is_empty());
    }

    #[test]
    fn test_rename_failure_restores_label() {
        let (_temp, browser, root) = open();
        let b = id(&browser, &root.join("b.txt"));
        browser.view().lock().begin_rename(b);
        let err = browser.rename(b, "A").unwrap_err();
        assert!(matches!(err, FsError::NameCollision(_)));
        let updates = browser.view().lock().take_updates();
        assert_eq!(
            updates,
            vec![ViewUpdate::Relabel {
                node: b,
                name: "b.txt".to_string()
            }]
        );
    }

    #[test]
    fn test_rename_reordering_moves_row() {
        let (_temp, browser, root) = open();
        let root_id = browser.tree().read().root();
        let c = browser.create_file(root_id).unwrap();
        browser.view().lock().take_updates();
        // untitled sorts after b.txt; "a.md" sorts before it
        browser.rename(c, "a.md").unwrap();
        let updates = browser.view().lock().take_updates();
        assert_eq!(updates.len(), 1);
        assert!(matches!(
            updates[0],
            ViewUpdate::Move {
                from_index: 2,
                to_index: 1,
                ..
            }
        ));
        assert!(root.join("a.md").is_file());
    }

    #[test]
    fn test_move_skips_items_already_in_target() {
        let (_temp, browser, root) = open();
        let a = id(&browser, &root.join("A"));
        let a_txt = id(&browser, &root.join("A/a.txt"));
        let b = id(&browser, &root.join("b.txt"));
        let outcome = browser.move_items(&[a_txt, b], a);
        assert_eq!(outcome.completed, vec![b]);
        assert_eq!(outcome.skipped, vec![root.join("A/a.txt")]);
        assert!(root.join("A/b.txt").is_file());
    }

    #[test]
    fn test_delete_batch_covers_descendants() {
        let (_temp, browser, root) = open();
        let a = id(&browser, &root.join("A"));
        let a_txt = id(&browser, &root.join("A/a.txt"));
        let outcome = browser.delete_items(&[a_txt, a]);
        assert_eq!(outcome.completed, vec![a]);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(!root.join("A").exists());
    }

    #[test]
    fn test_duplicate_selects_copies() {
        let (_temp, browser, root) = open();
        let b = id(&browser, &root.join("b.txt"));
        let outcome = browser.duplicate_items(&[b]);
        assert!(outcome.succeeded());
        assert!(root.join("b copy.txt").is_file());
        assert_eq!(browser.selection(), outcome.completed);
    }

    #[test]
    fn test_target_directory() {
        let (_temp, browser, root) = open();
        let a = id(&browser, &root.join("A"));
        let a_txt = id(&browser, &root.join("A/a.txt"));
        let root_id = browser.tree().read().root();
        assert_eq!(browser.target_directory(Some(a)), a);
        assert_eq!(browser.target_directory(Some(a_txt)), a);
        assert_eq!(browser.target_directory(None), root_id);
    }
}
