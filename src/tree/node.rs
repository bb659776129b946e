//! Filesystem node types and sibling ordering

use crate::error::FsError;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Kind of entry a node mirrors.
///
/// Declaration order is the primary sibling sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Directory,
    Package,
    File,
    Alias,
}

impl NodeKind {
    /// Only plain directories hold children; packages and aliases are leaves.
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Directory)
    }
}

/// Metadata needed to place a new node in a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub name: String,
    pub kind: NodeKind,
    pub writable: bool,
    pub alias_target: Option<PathBuf>,
}

impl NodeEntry {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            writable: true,
            alias_target: None,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            writable: true,
            alias_target: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// One mirrored filesystem entry.
///
/// The parent is stored as an id, never as an owning link; the arena in
/// [`NodeTree`](super::NodeTree) owns every node.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) location: PathBuf,
    pub(crate) kind: NodeKind,
    pub(crate) hidden: bool,
    pub(crate) writable: bool,
    pub(crate) alias_target: Option<PathBuf>,
    pub(crate) children: Option<Vec<NodeId>>,
    pub(crate) parent: Option<NodeId>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_alias(&self) -> bool {
        self.kind == NodeKind::Alias
    }

    pub fn alias_target(&self) -> Option<&Path> {
        self.alias_target.as_deref()
    }

    pub fn is_directory(&self) -> bool {
        self.children.is_some()
    }

    /// Children in sibling order; `None` for non-directories
    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn entry(&self) -> NodeEntry {
        NodeEntry {
            name: self.name.clone(),
            kind: self.kind,
            writable: self.writable,
            alias_target: self.alias_target.clone(),
        }
    }
}

/// Sibling order: kind first, then case-insensitive name, then exact name.
pub fn sibling_order(a: &Node, b: &Node) -> Ordering {
    a.kind
        .cmp(&b.kind)
        .then_with(|| {
            a.name
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.name.chars().flat_map(char::to_lowercase))
        })
        .then_with(|| a.name.cmp(&b.name))
}

/// Hidden entries follow the leading-dot convention
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Key under which a sibling name is indexed. Names that differ only in
/// Unicode normalization share a key, as the filesystem would store them.
pub(crate) fn name_key(name: &str) -> String {
    if name.is_ascii() {
        name.to_string()
    } else {
        name.nfc().collect()
    }
}

/// Reject names that cannot denote a single directory entry
pub fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
        || (cfg!(windows) && name.contains('\\'))
    {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Split a file name into stem and extension (`".bashrc"` has no extension).
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_puts_directories_first() {
        assert!(NodeKind::Directory < NodeKind::Package);
        assert!(NodeKind::Package < NodeKind::File);
        assert!(NodeKind::File < NodeKind::Alias);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("notes.txt").is_ok());
        assert!(validate_name(".hidden").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.txt"), ("a", Some("txt")));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", Some("gz")));
        assert_eq!(split_extension(".bashrc"), (".bashrc", None));
        assert_eq!(split_extension("folder"), ("folder", None));
        assert_eq!(split_extension("trailing."), ("trailing.", None));
    }

    #[test]
    fn test_name_key_normalizes_unicode() {
        // "é" precomposed vs "e" + combining acute
        assert_eq!(name_key("caf\u{e9}"), name_key("cafe\u{301}"));
        assert_ne!(name_key("cafe"), name_key("caf\u{e9}"));
        assert_ne!(name_key("b.txt"), name_key("B.txt"));
    }
}
