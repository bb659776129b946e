//! Closed command set: one variant per structural edit, each carrying its
//! already-resolved targets.

use super::{BatchOutcome, Browser};
use crate::error::FsError;
use crate::types::NodeId;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateFile { parent: NodeId },
    CreateFolder { parent: NodeId },
    Rename { node: NodeId, name: String },
    Move { sources: Vec<NodeId>, target: NodeId },
    Copy { sources: Vec<PathBuf>, target: NodeId },
    Duplicate { nodes: Vec<NodeId> },
    Delete { nodes: Vec<NodeId> },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateFile { .. } => "create-file",
            Command::CreateFolder { .. } => "create-folder",
            Command::Rename { .. } => "rename",
            Command::Move { .. } => "move",
            Command::Copy { .. } => "copy",
            Command::Duplicate { .. } => "duplicate",
            Command::Delete { .. } => "delete",
        }
    }
}

/// A user action expressed against the current selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    NewFile,
    NewFolder,
    Rename(String),
    MoveTo(NodeId),
    CopyTo(NodeId),
    Duplicate,
    Delete,
}

#[derive(Debug)]
pub enum CommandOutcome {
    Created(NodeId),
    Renamed { node: NodeId, changed: bool },
    Batch(BatchOutcome),
    Failed(FsError),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            CommandOutcome::Created(_) | CommandOutcome::Renamed { .. } => true,
            CommandOutcome::Batch(batch) => batch.succeeded() || batch.failed.is_empty(),
            CommandOutcome::Failed(_) => false,
        }
    }
}

impl Browser {
    /// Resolve an action against the selection once, into a concrete command.
    ///
    /// `None` when the action needs a selection shape that is not present
    /// (rename wants exactly one node; batch actions want at least one).
    pub fn resolve_action(&self, action: SelectionAction) -> Option<Command> {
        let selection = self.selection();
        match action {
            SelectionAction::NewFile => Some(Command::CreateFile {
                parent: self.target_directory(selection.first().copied()),
            }),
            SelectionAction::NewFolder => Some(Command::CreateFolder {
                parent: self.target_directory(selection.first().copied()),
            }),
            SelectionAction::Rename(name) => match selection.as_slice() {
                [node] => Some(Command::Rename { node: *node, name }),
                _ => None,
            },
            _ if selection.is_empty() => None,
            SelectionAction::MoveTo(target) => Some(Command::Move {
                sources: selection,
                target,
            }),
            SelectionAction::CopyTo(target) => {
                let tree = self.tree();
                let tree = tree.read();
                Some(Command::Copy {
                    sources: super::locations_of(&tree, &selection),
                    target,
                })
            }
            SelectionAction::Duplicate => Some(Command::Duplicate { nodes: selection }),
            SelectionAction::Delete => Some(Command::Delete { nodes: selection }),
        }
    }

    pub fn execute(&self, command: Command) -> CommandOutcome {
        debug!(command = command.name(), "Executing command");
        match command {
            Command::CreateFile { parent } => match self.create_file(parent) {
                Ok(node) => CommandOutcome::Created(node),
                Err(e) => CommandOutcome::Failed(e),
            },
            Command::CreateFolder { parent } => match self.create_folder(parent) {
                Ok(node) => CommandOutcome::Created(node),
                Err(e) => CommandOutcome::Failed(e),
            },
            Command::Rename { node, name } => match self.rename(node, &name) {
                Ok(changed) => CommandOutcome::Renamed { node, changed },
                Err(e) => CommandOutcome::Failed(e),
            },
            Command::Move { sources, target } => {
                CommandOutcome::Batch(self.move_items(&sources, target))
            }
            Command::Copy { sources, target } => {
                CommandOutcome::Batch(self.copy_items(&sources, target))
            }
            Command::Duplicate { nodes } => CommandOutcome::Batch(self.duplicate_items(&nodes)),
            Command::Delete { nodes } => CommandOutcome::Batch(self.delete_items(&nodes)),
        }
    }
}
