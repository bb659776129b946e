//! View Binding
//!
//! Translates the node tree into row-indexed presentation state. The rows are
//! derived from [`ViewBinding::children`], filtered by an injected "show
//! hidden" flag, and flattened through the currently expanded directories.
//!
//! Incremental updates (insert, remove, move) must be given indices that are
//! already consistent with the post-mutation `children()` result. An update
//! that disagrees is logged and degrades to a full reload, so the row mapping
//! never drifts from the tree.

use crate::tree::{NodeKind, NodeTree};
use crate::types::NodeId;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Animation hint attached to an incremental update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Animation {
    #[default]
    None,
    Fade,
    Slide,
}

/// A journaled change the host applies to its on-screen rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    Insert {
        parent: NodeId,
        index: usize,
        node: NodeId,
        animation: Animation,
    },
    Remove {
        parent: NodeId,
        index: usize,
        node: NodeId,
        animation: Animation,
    },
    Move {
        node: NodeId,
        from_parent: NodeId,
        from_index: usize,
        to_parent: NodeId,
        to_index: usize,
        animation: Animation,
    },
    Relabel {
        node: NodeId,
        name: String,
    },
    Reload,
}

impl ViewUpdate {
    pub fn is_reload(&self) -> bool {
        matches!(self, ViewUpdate::Reload)
    }
}

/// One rendered row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub node: NodeId,
    pub parent: NodeId,
    pub depth: usize,
    pub name: String,
    pub location: PathBuf,
    pub kind: NodeKind,
    pub is_directory: bool,
    pub expanded: bool,
}

/// In-place rename in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub node: NodeId,
    /// Name displayed before editing began
    pub original: String,
}

#[derive(Debug)]
pub struct ViewBinding {
    root: NodeId,
    show_hidden: bool,
    /// Children as currently presented, for the root and every open directory
    presented: HashMap<NodeId, Vec<NodeId>>,
    /// Expanded directories with their last known location
    expanded: HashMap<NodeId, PathBuf>,
    rows: Vec<Row>,
    row_index: HashMap<NodeId, usize>,
    selection: Vec<NodeId>,
    editing: Option<EditSession>,
    updates: Vec<ViewUpdate>,
}

impl ViewBinding {
    pub fn new(tree: &NodeTree, show_hidden: bool) -> Self {
        let mut view = Self {
            root: tree.root(),
            show_hidden,
            presented: HashMap::new(),
            expanded: HashMap::new(),
            rows: Vec::new(),
            row_index: HashMap::new(),
            selection: Vec::new(),
            editing: None,
            updates: Vec::new(),
        };
        view.rebuild_rows(tree);
        view
    }

    /// Ordered, hidden-filtered children of `parent`.
    ///
    /// The only source of row counts and child indices.
    pub fn children(tree: &NodeTree, parent: NodeId, show_hidden: bool) -> Vec<NodeId> {
        tree.visible_children(parent, show_hidden)
    }

    /// [`children`](Self::children) with this view's hidden-entry setting
    pub fn visible_children(&self, tree: &NodeTree, parent: NodeId) -> Vec<NodeId> {
        Self::children(tree, parent, self.show_hidden)
    }

    /// Index of `node` among its parent's visible children
    pub fn child_index(&self, tree: &NodeTree, node: NodeId) -> Option<usize> {
        tree.visible_index(node, self.show_hidden)
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    pub fn set_show_hidden(&mut self, tree: &NodeTree, show_hidden: bool) {
        if self.show_hidden != show_hidden {
            self.show_hidden = show_hidden;
            self.reload(tree);
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_of(&self, node: NodeId) -> Option<usize> {
        self.row_index.get(&node).copied()
    }

    pub fn node_at(&self, index: usize) -> Option<NodeId> {
        self.rows.get(index).map(|r| r.node)
    }

    pub fn is_open(&self, node: NodeId) -> bool {
        self.presented.contains_key(&node)
    }

    pub fn is_expanded(&self, node: NodeId) -> bool {
        node == self.root || self.expanded.contains_key(&node)
    }

    /// Expanded directories, root excluded
    pub fn expanded_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.expanded.keys().copied().collect();
        nodes.sort();
        nodes
    }

    /// Mark a directory expanded; returns false when nothing changed
    pub fn expand(&mut self, tree: &NodeTree, node: NodeId) -> bool {
        if node == self.root || self.expanded.contains_key(&node) {
            return false;
        }
        let Some(entry) = tree.get(node).filter(|n| n.is_directory()) else {
            return false;
        };
        self.expanded.insert(node, entry.location().to_path_buf());
        self.rebuild_rows(tree);
        true
    }

    pub fn collapse(&mut self, tree: &NodeTree, node: NodeId) -> bool {
        if self.expanded.remove(&node).is_none() {
            return false;
        }
        self.rebuild_rows(tree);
        true
    }

    /// Insert `node` at `index` under `parent`; false when the view reloaded instead
    pub fn insert(
        &mut self,
        tree: &NodeTree,
        parent: NodeId,
        index: usize,
        node: NodeId,
        animation: Animation,
    ) -> bool {
        let expected = self.visible_children(tree, parent);
        let consistent = expected.get(index) == Some(&node)
            && match self.presented.get_mut(&parent) {
                Some(presented) if index <= presented.len() => {
                    presented.insert(index, node);
                    *presented == expected
                }
                Some(_) => false,
                None => true,
            };
        if !consistent {
            return self.degrade(tree, "insert", node);
        }
        self.updates.push(ViewUpdate::Insert {
            parent,
            index,
            node,
            animation,
        });
        self.rebuild_rows(tree);
        true
    }

    /// Remove `node` from `index` under `parent`; false when the view reloaded instead
    pub fn remove(
        &mut self,
        tree: &NodeTree,
        parent: NodeId,
        index: usize,
        node: NodeId,
        animation: Animation,
    ) -> bool {
        let expected = self.visible_children(tree, parent);
        let consistent = !expected.contains(&node)
            && match self.presented.get_mut(&parent) {
                Some(presented) if presented.get(index) == Some(&node) => {
                    presented.remove(index);
                    *presented == expected
                }
                Some(_) => false,
                None => true,
            };
        if !consistent {
            return self.degrade(tree, "remove", node);
        }
        self.forget_missing(tree);
        self.updates.push(ViewUpdate::Remove {
            parent,
            index,
            node,
            animation,
        });
        self.rebuild_rows(tree);
        true
    }

    /// Move `node` between (or within) parents; false when the view reloaded instead
    #[allow(clippy::too_many_arguments)]
    pub fn move_item(
        &mut self,
        tree: &NodeTree,
        node: NodeId,
        from_parent: NodeId,
        from_index: usize,
        to_parent: NodeId,
        to_index: usize,
        animation: Animation,
    ) -> bool {
        let expected_to = self.visible_children(tree, to_parent);
        let expected_from = self.visible_children(tree, from_parent);

        let mut consistent = expected_to.get(to_index) == Some(&node);
        if consistent {
            if let Some(presented) = self.presented.get_mut(&from_parent) {
                consistent = presented.get(from_index) == Some(&node);
                if consistent {
                    presented.remove(from_index);
                }
            }
        }
        if consistent {
            if let Some(presented) = self.presented.get_mut(&to_parent) {
                consistent = to_index <= presented.len();
                if consistent {
                    presented.insert(to_index, node);
                    consistent = *presented == expected_to;
                }
            }
        }
        if consistent && from_parent != to_parent {
            if let Some(presented) = self.presented.get(&from_parent) {
                consistent = *presented == expected_from;
            }
        }
        if !consistent {
            return self.degrade(tree, "move", node);
        }
        self.updates.push(ViewUpdate::Move {
            node,
            from_parent,
            from_index,
            to_parent,
            to_index,
            animation,
        });
        self.rebuild_rows(tree);
        true
    }

    /// Refresh a row's label from the tree without structural change
    pub fn relabel(&mut self, tree: &NodeTree, node: NodeId) {
        if let Some(name) = tree.get(node).map(|n| n.name().to_string()) {
            self.set_label(node, name);
            self.rebuild_rows(tree);
        }
    }

    /// Put back the name shown before a failed rename
    pub fn restore_label(&mut self, node: NodeId, name: &str) {
        self.set_label(node, name.to_string());
    }

    fn set_label(&mut self, node: NodeId, name: String) {
        if let Some(row) = self.row_index.get(&node).and_then(|i| self.rows.get_mut(*i)) {
            row.name = name.clone();
        }
        self.updates.push(ViewUpdate::Relabel { node, name });
    }

    /// Rebuild everything from the tree.
    ///
    /// Expanded directories are re-associated by identity when the node still
    /// exists, otherwise by location. Selection keeps only rows still shown.
    pub fn reload(&mut self, tree: &NodeTree) {
        self.root = tree.root();
        let previous = std::mem::take(&mut self.expanded);
        for (id, location) in previous {
            let resolved = if tree.contains(id) {
                Some(id)
            } else {
                tree.locate(&location)
            };
            if let Some(node) = resolved
                .and_then(|id| tree.get(id))
                .filter(|n| n.is_directory())
            {
                self.expanded
                    .insert(node.id(), node.location().to_path_buf());
            }
        }
        self.presented.clear();
        self.rebuild_rows(tree);

        let shown = &self.row_index;
        self.selection.retain(|id| shown.contains_key(id));
        if self
            .editing
            .as_ref()
            .is_some_and(|session| !shown.contains_key(&session.node))
        {
            self.editing = None;
        }
        self.updates.push(ViewUpdate::Reload);
        debug!(rows = self.rows.len(), expanded = self.expanded.len(), "Reloaded view");
    }

    fn degrade(&mut self, tree: &NodeTree, operation: &str, node: NodeId) -> bool {
        warn!(operation, node = %node, "Incremental update disagrees with tree; reloading");
        self.reload(tree);
        false
    }

    fn forget_missing(&mut self, tree: &NodeTree) {
        self.presented.retain(|id, _| tree.contains(*id));
        self.expanded.retain(|id, _| tree.contains(*id));
        self.selection.retain(|id| tree.contains(*id));
        if self
            .editing
            .as_ref()
            .is_some_and(|session| !tree.contains(session.node))
        {
            self.editing = None;
        }
    }

    fn rebuild_rows(&mut self, tree: &NodeTree) {
        let mut open = HashMap::new();
        let mut rows = Vec::new();
        self.collect_rows(tree, self.root, 0, &mut open, &mut rows);
        self.presented = open;
        self.row_index = rows.iter().enumerate().map(|(i, r)| (r.node, i)).collect();
        self.rows = rows;
        for (id, location) in self.expanded.iter_mut() {
            if let Some(node) = tree.get(*id) {
                *location = node.location().to_path_buf();
            }
        }
    }

    fn collect_rows(
        &self,
        tree: &NodeTree,
        parent: NodeId,
        depth: usize,
        open: &mut HashMap<NodeId, Vec<NodeId>>,
        rows: &mut Vec<Row>,
    ) {
        let children = match self.presented.get(&parent) {
            Some(children) => children.clone(),
            None => self.visible_children(tree, parent),
        };
        for child in &children {
            let Some(node) = tree.get(*child) else { continue };
            let expanded = node.is_directory() && self.expanded.contains_key(child);
            rows.push(Row {
                node: *child,
                parent,
                depth,
                name: node.name().to_string(),
                location: node.location().to_path_buf(),
                kind: node.kind(),
                is_directory: node.is_directory(),
                expanded,
            });
            if expanded {
                self.collect_rows(tree, *child, depth + 1, open, rows);
            }
        }
        open.insert(parent, children);
    }

    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    /// Replace the selection, keeping only nodes that have a row
    pub fn select(&mut self, nodes: &[NodeId]) {
        self.selection.clear();
        for node in nodes {
            if self.row_index.contains_key(node) && !self.selection.contains(node) {
                self.selection.push(*node);
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected identities with their locations, for re-resolution after a reload
    pub fn selection_snapshot(&self) -> Vec<(NodeId, PathBuf)> {
        self.selection
            .iter()
            .filter_map(|id| {
                let row = self.rows.get(*self.row_index.get(id)?)?;
                Some((*id, row.location.clone()))
            })
            .collect()
    }

    /// Re-resolve a snapshot against the current rows.
    ///
    /// Entries resolve by identity, then by location; those with no row are
    /// dropped silently. Returns the new selection.
    pub fn restore_selection(
        &mut self,
        tree: &NodeTree,
        snapshot: &[(NodeId, PathBuf)],
    ) -> Vec<NodeId> {
        let mut restored = Vec::new();
        for (id, location) in snapshot {
            let resolved = if tree.contains(*id) {
                Some(*id)
            } else {
                tree.locate(location)
            };
            if let Some(id) = resolved.filter(|id| self.row_index.contains_key(id)) {
                if !restored.contains(&id) {
                    restored.push(id);
                }
            }
        }
        self.selection = restored.clone();
        restored
    }

    /// Enter rename mode on a shown row
    pub fn begin_rename(&mut self, node: NodeId) -> bool {
        let Some(row) = self.row_of(node).and_then(|i| self.rows.get(i)) else {
            return false;
        };
        self.editing = Some(EditSession {
            node,
            original: row.name.clone(),
        });
        true
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.editing.as_ref()
    }

    pub fn end_rename(&mut self) -> Option<EditSession> {
        self.editing.take()
    }

    pub fn updates(&self) -> &[ViewUpdate] {
        &self.updates
    }

    /// Drain the update journal
    pub fn take_updates(&mut self) -> Vec<ViewUpdate> {
        std::mem::take(&mut self.updates)
    }
}
