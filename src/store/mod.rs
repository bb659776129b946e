//! Directory Store
//!
//! Owns the canonical [`NodeTree`], performs the actual filesystem mutations,
//! and emits one notification per completed mutation. Externally observed
//! changes are relayed through the same notification channel.

pub mod fs;
pub mod notifications;
pub mod watch;

pub use fs::FsDirectoryStore;
pub use notifications::{ChangeEvent, Delivery, Notification, NotificationHub, Subscription};
pub use watch::ExternalWatcher;

use crate::error::FsError;
use crate::tree::NodeTree;
use crate::types::{DocumentId, NodeId};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Shared handle to a store's canonical tree
pub type SharedTree = Arc<RwLock<NodeTree>>;

/// Directory Store interface.
///
/// Mutations are synchronous from the caller's point of view and each yields
/// the affected node (or a filesystem-style failure). Callers must not hold a
/// lock on [`tree`](DirectoryStore::tree) while calling a mutation.
pub trait DirectoryStore: Send + Sync {
    /// Document whose notifications this store emits
    fn document(&self) -> DocumentId;

    fn tree(&self) -> SharedTree;

    fn lookup(&self, location: &Path) -> Option<NodeId> {
        self.tree().read().locate(location)
    }

    fn create_file(&self, parent: NodeId, name: &str) -> Result<NodeId, FsError>;

    fn create_folder(&self, parent: NodeId, name: &str) -> Result<NodeId, FsError>;

    fn rename(&self, node: NodeId, new_name: &str) -> Result<NodeId, FsError>;

    fn move_node(&self, node: NodeId, target: NodeId) -> Result<NodeId, FsError>;

    /// Copy `source` (inside or outside the tree) into the `target` directory
    fn copy(&self, source: &Path, target: NodeId) -> Result<NodeId, FsError>;

    fn duplicate(&self, node: NodeId) -> Result<NodeId, FsError>;

    fn delete(&self, node: NodeId) -> Result<(), FsError>;

    fn subscribe(&self) -> Subscription;
}
