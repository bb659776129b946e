//! Drag-and-Drop Controller
//!
//! A drag goes through two phases. Validation is pure and may run any number
//! of times while the pointer moves: it resolves the drop target, checks
//! writability and containment, and decides between copy and move.
//! Acceptance happens at most once per [`DragSession`] and applies the
//! decision through the browser, item by item.

use crate::browser::{BatchOutcome, Browser};
use crate::tree::{canonical_location, NodeTree};
use crate::types::NodeId;
use std::ops::BitOr;
use std::path::PathBuf;
use tracing::{debug, info};

/// Operations the drag source permits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationMask(u8);

impl OperationMask {
    pub const NONE: OperationMask = OperationMask(0);
    pub const COPY: OperationMask = OperationMask(1);
    pub const MOVE: OperationMask = OperationMask(1 << 1);
    /// Delete, i.e. drop onto the trash
    pub const DELETE: OperationMask = OperationMask(1 << 2);
    pub const ALL: OperationMask = OperationMask(0b111);

    pub fn contains(self, other: OperationMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn allows(self, operation: DropOperation) -> bool {
        match operation {
            DropOperation::Copy => self.contains(Self::COPY),
            DropOperation::Move => self.contains(Self::MOVE),
        }
    }
}

impl BitOr for OperationMask {
    type Output = OperationMask;

    fn bitor(self, rhs: OperationMask) -> OperationMask {
        OperationMask(self.0 | rhs.0)
    }
}

/// What is being dragged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    /// Source locations, in drag order
    pub sources: Vec<PathBuf>,
    pub operations: OperationMask,
    /// The drag started in this view (internal reordering)
    pub same_view: bool,
    /// The copy modifier key is held
    pub copy_modifier: bool,
}

impl DragPayload {
    /// Drag of rows from this view
    pub fn internal(sources: Vec<PathBuf>, operations: OperationMask) -> Self {
        Self {
            sources,
            operations,
            same_view: true,
            copy_modifier: false,
        }
    }

    /// Drag arriving from another application
    pub fn external(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            operations: OperationMask::COPY | OperationMask::MOVE,
            same_view: false,
            copy_modifier: false,
        }
    }

    pub fn with_copy_modifier(mut self, copy_modifier: bool) -> Self {
        self.copy_modifier = copy_modifier;
        self
    }
}

/// Where the pointer is relative to the proposed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    /// On the item itself
    Onto,
    /// Between the item's children, at this child index
    Into(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropProposal {
    /// Proposed item; `None` is the empty area, i.e. the root
    pub item: Option<NodeId>,
    pub position: DropPosition,
}

impl DropProposal {
    pub fn onto(item: NodeId) -> Self {
        Self {
            item: Some(item),
            position: DropPosition::Onto,
        }
    }

    pub fn root() -> Self {
        Self {
            item: None,
            position: DropPosition::Onto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOperation {
    Copy,
    Move,
}

/// Why a drop is not permitted. These are decisions, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropRefusal {
    NotWritable,
    /// The target is a dragged item or lies inside one
    InvalidContainment,
    NotFound,
    OperationNotAllowed,
    EmptyPayload,
    AlreadyAccepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropDecision {
    Accept {
        target: NodeId,
        operation: DropOperation,
    },
    Refuse(DropRefusal),
}

impl DropDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, DropDecision::Accept { .. })
    }
}

#[derive(Debug)]
pub enum DropOutcome {
    Refused(DropRefusal),
    Completed {
        /// `None` for a trash drop
        operation: Option<DropOperation>,
        batch: BatchOutcome,
    },
}

impl DropOutcome {
    /// Accepted and at least one item succeeded
    pub fn succeeded(&self) -> bool {
        match self {
            DropOutcome::Refused(_) => false,
            DropOutcome::Completed { batch, .. } => batch.succeeded(),
        }
    }

    pub fn batch(&self) -> Option<&BatchOutcome> {
        match self {
            DropOutcome::Refused(_) => None,
            DropOutcome::Completed { batch, .. } => Some(batch),
        }
    }
}

/// Copy modifier forces copy; otherwise same view moves and elsewhere copies
pub fn decide_operation(copy_modifier: bool, same_view: bool) -> DropOperation {
    if copy_modifier || !same_view {
        DropOperation::Copy
    } else {
        DropOperation::Move
    }
}

/// Validate a proposed drop without touching anything
pub fn validate_drop(tree: &NodeTree, payload: &DragPayload, proposal: &DropProposal) -> DropDecision {
    if payload.sources.is_empty() {
        return DropDecision::Refuse(DropRefusal::EmptyPayload);
    }
    let item = proposal.item.unwrap_or_else(|| tree.root());
    let Some(node) = tree.get(item) else {
        return DropDecision::Refuse(DropRefusal::NotFound);
    };

    // Dropping onto a leaf targets the folder holding it
    let target = if node.is_directory() {
        node
    } else {
        match node.parent().and_then(|p| tree.get(p)) {
            Some(parent) => parent,
            None => return DropDecision::Refuse(DropRefusal::NotFound),
        }
    };

    if !target.is_writable() {
        return DropDecision::Refuse(DropRefusal::NotWritable);
    }
    let target_location = target.location();
    let holds_target = |source: &PathBuf| match tree.locate(source) {
        Some(id) => tree.is_same_or_ancestor(id, target.id()),
        None => {
            let source = canonical_location(source);
            match tree.locate(&source) {
                Some(id) => tree.is_same_or_ancestor(id, target.id()),
                None => target_location.starts_with(&source),
            }
        }
    };
    if payload.sources.iter().any(holds_target) {
        return DropDecision::Refuse(DropRefusal::InvalidContainment);
    }

    let operation = decide_operation(payload.copy_modifier, payload.same_view);
    if !payload.operations.allows(operation) {
        return DropDecision::Refuse(DropRefusal::OperationNotAllowed);
    }
    DropDecision::Accept {
        target: target.id(),
        operation,
    }
}

/// One drag interaction; validation is repeatable, acceptance happens once
#[derive(Debug)]
pub struct DragSession {
    payload: DragPayload,
    finished: bool,
}

impl DragSession {
    pub fn new(payload: DragPayload) -> Self {
        Self {
            payload,
            finished: false,
        }
    }

    pub fn payload(&self) -> &DragPayload {
        &self.payload
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_copy_modifier(&mut self, copy_modifier: bool) {
        self.payload.copy_modifier = copy_modifier;
    }

    pub fn validate(&self, tree: &NodeTree, proposal: &DropProposal) -> DropDecision {
        if self.finished {
            return DropDecision::Refuse(DropRefusal::AlreadyAccepted);
        }
        validate_drop(tree, &self.payload, proposal)
    }

    /// Perform the drop.
    ///
    /// Validation runs again against the current tree. Each item commits on
    /// its own; a failing item is reported and the rest still run.
    pub fn accept(&mut self, browser: &Browser, proposal: &DropProposal) -> DropOutcome {
        let decision = {
            let tree = browser.tree();
            let tree = tree.read();
            self.validate(&tree, proposal)
        };
        let (target, operation) = match decision {
            DropDecision::Accept { target, operation } => (target, operation),
            DropDecision::Refuse(refusal) => {
                debug!(?refusal, "Drop refused");
                return DropOutcome::Refused(refusal);
            }
        };
        self.finished = true;

        let batch = match operation {
            DropOperation::Copy => browser.copy_items(&self.payload.sources, target),
            DropOperation::Move => {
                let mut batch = BatchOutcome::default();
                let nodes = browser.resolve(&self.payload.sources, &mut batch);
                batch.absorb(browser.move_items(&nodes, target));
                batch
            }
        };
        info!(
            ?operation,
            target = %target,
            completed = batch.completed.len(),
            failed = batch.failed.len(),
            "Drop accepted"
        );
        DropOutcome::Completed {
            operation: Some(operation),
            batch,
        }
    }

    /// The drag ended over the trash: delete the dragged items
    pub fn drop_on_trash(&mut self, browser: &Browser) -> DropOutcome {
        if self.finished {
            return DropOutcome::Refused(DropRefusal::AlreadyAccepted);
        }
        if self.payload.sources.is_empty() {
            return DropOutcome::Refused(DropRefusal::EmptyPayload);
        }
        if !self.payload.operations.contains(OperationMask::DELETE) {
            return DropOutcome::Refused(DropRefusal::OperationNotAllowed);
        }
        self.finished = true;

        let mut batch = BatchOutcome::default();
        let nodes = browser.resolve(&self.payload.sources, &mut batch);
        batch.absorb(browser.delete_items(&nodes));
        info!(
            completed = batch.completed.len(),
            failed = batch.failed.len(),
            "Trash drop finished"
        );
        DropOutcome::Completed {
            operation: None,
            batch,
        }
    }
}
