//! Arena-backed node tree
//!
//! Nodes live in a map keyed by [`NodeId`]; each node records its parent id and
//! an ordered list of child ids. Every directory also keeps an index from
//! normalized child name to id, so name lookups do not scan siblings.
//! Queries are pure. Mutations are crate-private and are driven by the
//! directory store, which is responsible for rejecting cycles and sibling name
//! collisions before the filesystem is touched.

use super::node::{
    is_hidden_name, name_key, sibling_order, split_extension, validate_name, Node, NodeEntry,
    NodeKind,
};
use crate::error::FsError;
use crate::types::NodeId;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// The in-memory mirror of one directory subtree
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    /// Per directory: normalized child name -> child id
    names: HashMap<NodeId, HashMap<String, NodeId>>,
    root: NodeId,
    next_id: u64,
}

impl NodeTree {
    /// Create a tree holding only the root directory
    pub fn new(root_location: impl Into<PathBuf>, writable: bool) -> Self {
        let location = root_location.into();
        let name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.to_string_lossy().into_owned());
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                name,
                location,
                kind: NodeKind::Directory,
                hidden: false,
                writable,
                alias_target: None,
                children: Some(Vec::new()),
                parent: None,
            },
        );
        Self {
            nodes,
            names: HashMap::from([(root, HashMap::new())]),
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_location(&self) -> &Path {
        // The root is never removed.
        self.nodes
            .get(&self.root)
            .map(|n| n.location.as_path())
            .unwrap_or_else(|| Path::new(""))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Children of a node in sibling order, unfiltered
    pub fn children(&self, id: NodeId) -> Option<&[NodeId]> {
        self.nodes.get(&id).and_then(|n| n.children())
    }

    /// Locate a node by absolute location
    pub fn locate(&self, location: &Path) -> Option<NodeId> {
        let relative = location.strip_prefix(self.root_location()).ok()?;
        let mut current = self.root;
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    current = self.child_named(current, name.to_str()?)?;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(current)
    }

    /// Find a direct child by name
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.names.get(&parent)?.get(&name_key(name)).copied()
    }

    /// Ancestors from the node itself up to the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(&id);
        while let Some(node) = current {
            chain.push(node.id);
            current = node.parent.and_then(|p| self.nodes.get(&p));
        }
        chain
    }

    /// Ancestors from the root down to the node itself
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = self.ancestors(id);
        chain.reverse();
        chain
    }

    /// True when `ancestor` is `node` or lies on its path to the root
    pub fn is_same_or_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Children that pass the hidden-entry filter, in sibling order
    pub fn visible_children(&self, parent: NodeId, show_hidden: bool) -> Vec<NodeId> {
        self.children(parent)
            .unwrap_or(&[])
            .iter()
            .copied()
            .filter(|id| {
                show_hidden || self.nodes.get(id).is_some_and(|n| !n.hidden)
            })
            .collect()
    }

    /// Index of a node among its filtered siblings
    ///
    /// `None` for the root, for unknown ids, and for hidden nodes when hidden
    /// entries are filtered out.
    pub fn visible_index(&self, id: NodeId, show_hidden: bool) -> Option<usize> {
        let parent = self.nodes.get(&id)?.parent?;
        self.visible_children(parent, show_hidden)
            .iter()
            .position(|child| *child == id)
    }

    /// Location relative to the root (empty for the root itself)
    pub fn relative_path(&self, id: NodeId) -> Option<PathBuf> {
        let node = self.nodes.get(&id)?;
        node.location
            .strip_prefix(self.root_location())
            .ok()
            .map(Path::to_path_buf)
    }

    /// A child name not yet used under `parent`.
    ///
    /// Tries `stem.ext`, then `stem 2.ext`, `stem 3.ext`, ...
    pub fn unique_child_name(&self, parent: NodeId, stem: &str, extension: Option<&str>) -> String {
        let compose = |suffix: Option<usize>| {
            let base = match suffix {
                Some(n) => format!("{} {}", stem, n),
                None => stem.to_string(),
            };
            match extension {
                Some(ext) => format!("{}.{}", base, ext),
                None => base,
            }
        };
        let mut candidate = compose(None);
        let mut n = 2;
        while self.child_named(parent, &candidate).is_some() {
            candidate = compose(Some(n));
            n += 1;
        }
        candidate
    }

    /// Name for a duplicate of `id` placed beside it: `name copy.ext`, `name copy 2.ext`, ...
    pub fn duplicate_name(&self, id: NodeId) -> Option<String> {
        let node = self.nodes.get(&id)?;
        let parent = node.parent?;
        let (stem, extension) = if node.kind == NodeKind::File {
            split_extension(&node.name)
        } else {
            (node.name.as_str(), None)
        };
        Some(self.unique_child_name(parent, &format!("{} copy", stem), extension))
    }

    fn location_of(&self, id: NodeId) -> Result<PathBuf, FsError> {
        self.nodes
            .get(&id)
            .map(|n| n.location.clone())
            .ok_or(FsError::StaleNode(id))
    }

    fn container_location(&self, id: NodeId) -> Result<PathBuf, FsError> {
        let node = self.nodes.get(&id).ok_or(FsError::StaleNode(id))?;
        if node.children.is_none() {
            return Err(FsError::NotADirectory(node.location.clone()));
        }
        Ok(node.location.clone())
    }

    fn ensure_free_name(&self, parent: NodeId, name: &str, except: Option<NodeId>) -> Result<(), FsError> {
        match self.child_named(parent, name) {
            Some(existing) if Some(existing) != except => {
                Err(FsError::NameCollision(self.location_of(parent)?.join(name)))
            }
            _ => Ok(()),
        }
    }

    /// Add a new child under `parent` at its sorted position
    pub(crate) fn insert_child(&mut self, parent: NodeId, entry: NodeEntry) -> Result<NodeId, FsError> {
        let id = self.add_child(parent, entry)?;
        self.place(parent, id);
        Ok(id)
    }

    /// Add a new child at the end of `parent`'s children.
    ///
    /// For bulk loads: the caller appends in sibling order or calls
    /// [`sort_children`](Self::sort_children) once afterwards.
    pub(crate) fn append_child(&mut self, parent: NodeId, entry: NodeEntry) -> Result<NodeId, FsError> {
        let id = self.add_child(parent, entry)?;
        if let Some(children) = self.nodes.get_mut(&parent).and_then(|n| n.children.as_mut()) {
            children.push(id);
        }
        Ok(id)
    }

    /// Create and index a node without linking it into the child order
    fn add_child(&mut self, parent: NodeId, entry: NodeEntry) -> Result<NodeId, FsError> {
        validate_name(&entry.name)?;
        let parent_location = self.container_location(parent)?;
        self.ensure_free_name(parent, &entry.name, None)?;

        let id = NodeId(self.next_id);
        self.next_id += 1;
        let container = entry.kind.is_container();
        let node = Node {
            id,
            location: parent_location.join(&entry.name),
            hidden: is_hidden_name(&entry.name),
            children: container.then(Vec::new),
            kind: entry.kind,
            writable: entry.writable,
            alias_target: entry.alias_target,
            name: entry.name,
            parent: Some(parent),
        };
        self.index(parent, &node.name, id);
        if container {
            self.names.insert(id, HashMap::new());
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn index(&mut self, parent: NodeId, name: &str, id: NodeId) {
        self.names.entry(parent).or_default().insert(name_key(name), id);
    }

    fn unindex(&mut self, parent: NodeId, name: &str) {
        if let Some(names) = self.names.get_mut(&parent) {
            names.remove(&name_key(name));
        }
    }

    /// Insert an unlinked child id into `parent`'s children by binary search
    fn place(&mut self, parent: NodeId, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else { return };
        let position = self.children(parent).unwrap_or(&[]).partition_point(|child| {
            self.nodes
                .get(child)
                .is_some_and(|c| sibling_order(c, node) == Ordering::Less)
        });
        if let Some(children) = self.nodes.get_mut(&parent).and_then(|n| n.children.as_mut()) {
            children.insert(position, id);
        }
    }

    /// Detach `id` from its parent's child order (the node stays in the arena)
    fn unlink(&mut self, parent: NodeId, id: NodeId) {
        if let Some(children) = self.nodes.get_mut(&parent).and_then(|n| n.children.as_mut()) {
            if let Some(position) = children.iter().position(|child| *child == id) {
                children.remove(position);
            }
        }
    }

    /// Rename in place; identity and descendants' identities are preserved
    pub(crate) fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), FsError> {
        validate_name(new_name)?;
        let parent = match self.nodes.get(&id) {
            Some(node) => node.parent.ok_or_else(|| FsError::NotWritable(node.location.clone()))?,
            None => return Err(FsError::StaleNode(id)),
        };
        self.ensure_free_name(parent, new_name, Some(id))?;
        let old_name = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.hidden = is_hidden_name(new_name);
                std::mem::replace(&mut node.name, new_name.to_string())
            }
            None => return Err(FsError::StaleNode(id)),
        };
        self.unindex(parent, &old_name);
        self.index(parent, new_name, id);
        self.relocate_subtree(id);
        self.unlink(parent, id);
        self.place(parent, id);
        Ok(())
    }

    /// Move a node under a new parent, refusing to create a cycle
    pub(crate) fn reparent(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), FsError> {
        let (name, old_parent) = match self.nodes.get(&id) {
            Some(node) => (
                node.name.clone(),
                node.parent.ok_or_else(|| FsError::NotWritable(node.location.clone()))?,
            ),
            None => return Err(FsError::StaleNode(id)),
        };
        let target_location = self.container_location(new_parent)?;
        if self.is_same_or_ancestor(id, new_parent) {
            return Err(FsError::InvalidContainment {
                item: self.location_of(id)?,
                target: target_location,
            });
        }
        if old_parent == new_parent {
            return Ok(());
        }
        self.ensure_free_name(new_parent, &name, None)?;

        self.unlink(old_parent, id);
        self.unindex(old_parent, &name);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(new_parent);
        }
        self.index(new_parent, &name, id);
        self.relocate_subtree(id);
        self.place(new_parent, id);
        Ok(())
    }

    /// Detach a node and drop its whole subtree, returning the removed ids
    pub(crate) fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, FsError> {
        let (parent, name) = match self.nodes.get(&id) {
            Some(node) => (
                node.parent.ok_or_else(|| FsError::NotWritable(node.location.clone()))?,
                node.name.clone(),
            ),
            None => return Err(FsError::StaleNode(id)),
        };
        self.unlink(parent, id);
        self.unindex(parent, &name);
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.names.remove(&current);
            if let Some(node) = self.nodes.remove(&current) {
                if let Some(children) = node.children {
                    stack.extend(children);
                }
                removed.push(current);
            }
        }
        Ok(removed)
    }

    /// Refresh a node's metadata from a fresh entry of the same kind
    pub(crate) fn refresh(&mut self, id: NodeId, entry: &NodeEntry) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.writable = entry.writable;
            node.alias_target = entry.alias_target.clone();
        }
    }

    /// Copy a subtree of `source` under `parent`, allocating fresh ids
    pub(crate) fn graft(
        &mut self,
        parent: NodeId,
        source: &NodeTree,
        source_id: NodeId,
    ) -> Result<NodeId, FsError> {
        let id = self.graft_unplaced(parent, source, source_id)?;
        self.place(parent, id);
        Ok(id)
    }

    /// Graft without linking the top node into `parent`'s child order.
    /// Descendants are appended in `source`'s order, which is already sorted.
    fn graft_unplaced(
        &mut self,
        parent: NodeId,
        source: &NodeTree,
        source_id: NodeId,
    ) -> Result<NodeId, FsError> {
        let node = source.get(source_id).ok_or(FsError::StaleNode(source_id))?;
        let id = self.add_child(parent, node.entry())?;
        let mut stack: Vec<(NodeId, NodeId)> = vec![(source_id, id)];
        while let Some((from, to)) = stack.pop() {
            for child in source.children(from).unwrap_or(&[]) {
                let Some(child_node) = source.get(*child) else { continue };
                let copy = self.append_child(to, child_node.entry())?;
                stack.push((*child, copy));
            }
        }
        Ok(id)
    }

    /// Reconcile the children of `dir` with a freshly scanned directory.
    ///
    /// Children matched by name and kind keep their ids; unmatched children
    /// are removed with their subtree; new entries are grafted with new ids.
    pub(crate) fn merge_rescan(
        &mut self,
        dir: NodeId,
        fresh: &NodeTree,
        fresh_dir: NodeId,
    ) -> Result<MergeSummary, FsError> {
        let mut summary = MergeSummary::default();
        if let Some(fresh_node) = fresh.get(fresh_dir) {
            self.refresh(dir, &fresh_node.entry());
        }
        let fresh_children: Vec<NodeId> = fresh.children(fresh_dir).unwrap_or(&[]).to_vec();
        let existing: Vec<NodeId> = self.children(dir).unwrap_or(&[]).to_vec();

        for child in existing {
            let Some(node) = self.nodes.get(&child) else { continue };
            let survives = fresh
                .child_named(fresh_dir, &node.name)
                .and_then(|fc| fresh.get(fc))
                .is_some_and(|f| f.kind == node.kind);
            if !survives {
                summary.removed += self.remove(child)?.len();
            }
        }

        let mut grafted = false;
        for fresh_child in fresh_children {
            let Some(fresh_node) = fresh.get(fresh_child) else { continue };
            match self.child_named(dir, &fresh_node.name) {
                Some(existing) => {
                    summary.preserved += 1;
                    self.refresh(existing, &fresh_node.entry());
                    if fresh_node.is_directory() {
                        let nested = self.merge_rescan(existing, fresh, fresh_child)?;
                        summary.absorb(nested);
                    }
                }
                None => {
                    let id = self.graft_unplaced(dir, fresh, fresh_child)?;
                    if let Some(children) = self.nodes.get_mut(&dir).and_then(|n| n.children.as_mut()) {
                        children.push(id);
                    }
                    grafted = true;
                    summary.added += self.subtree_len(id);
                }
            }
        }
        if grafted {
            self.sort_children(dir);
        }
        Ok(summary)
    }

    fn subtree_len(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                count += 1;
                stack.extend(node.children().unwrap_or(&[]).iter().copied());
            }
        }
        count
    }

    fn relocate_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let parent_location = self
                .nodes
                .get(&current)
                .and_then(|n| n.parent)
                .and_then(|p| self.nodes.get(&p))
                .map(|p| p.location.clone());
            if let (Some(parent_location), Some(node)) = (parent_location, self.nodes.get_mut(&current)) {
                node.location = parent_location.join(&node.name);
                if let Some(children) = &node.children {
                    stack.extend(children.iter().copied());
                }
            }
        }
    }

    /// Restore sibling order after bulk appends
    pub(crate) fn sort_children(&mut self, parent: NodeId) {
        let Some(mut children) = self.nodes.get_mut(&parent).and_then(|n| n.children.take()) else {
            return;
        };
        children.sort_by(|a, b| match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(a), Some(b)) => sibling_order(a, b),
            _ => Ordering::Equal,
        });
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children = Some(children);
        }
    }
}

/// Counts reported by an identity-preserving re-scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub preserved: usize,
    pub added: usize,
    pub removed: usize,
}

impl MergeSummary {
    pub(crate) fn absorb(&mut self, other: MergeSummary) {
        self.preserved += other.preserved;
        self.added += other.added;
        self.removed += other.removed;
    }
}
