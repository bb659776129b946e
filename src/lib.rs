//! Sprig: File-Browser Tree Synchronization and Drag-and-Drop
//!
//! Keeps an in-memory tree of a directory in step with the filesystem and
//! with a rendered outline view. Create, rename, duplicate, move, copy and
//! delete go through a directory store; the view is updated incrementally
//! and falls back to a full reload whenever an update would not line up
//! with what is rendered.

pub mod browser;
pub mod config;
pub mod dnd;
pub mod error;
pub mod expansion;
pub mod logging;
pub mod reconcile;
pub mod state;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod view;

pub use browser::{BatchOutcome, Browser, Command, CommandOutcome, ItemFailure};
pub use dnd::{DragPayload, DragSession, DropDecision, DropOperation, DropOutcome, DropProposal};
pub use error::{ApiError, FsError};
pub use store::{DirectoryStore, FsDirectoryStore, NotificationHub};
pub use tree::{NodeKind, NodeTree};
pub use types::{DocumentId, NodeId};
pub use view::{ViewBinding, ViewUpdate};
