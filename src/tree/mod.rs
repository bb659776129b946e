//! Node Tree
//!
//! Hierarchical in-memory mirror of one directory subtree. Nodes live in an
//! arena keyed by stable [`NodeId`](crate::types::NodeId)s.

pub mod arena;
pub mod node;
pub mod scan;

pub use arena::{MergeSummary, NodeTree};
pub use node::{Node, NodeEntry, NodeKind};
pub use scan::{canonical_location, ScanConfig, Scanner};
