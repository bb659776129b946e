//! Change notifications, keyed by originating document.

use crate::types::DocumentId;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::trace;

/// Filesystem change event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl ChangeEvent {
    /// Paths touched by the event
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) | ChangeEvent::Removed(p) => {
                vec![p.as_path()]
            }
            ChangeEvent::Renamed { from, to } => vec![from.as_path(), to.as_path()],
        }
    }
}

/// One completed mutation or relayed external change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub origin: DocumentId,
    pub event: ChangeEvent,
    /// Observed on disk rather than caused by a store mutation
    pub external: bool,
}

/// What a subscription yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Notification(Notification),
    /// The subscriber fell behind and this many notifications were dropped
    Missed(u64),
}

impl Delivery {
    /// Number of notifications this delivery stands for
    pub fn weight(&self) -> u64 {
        match self {
            Delivery::Notification(_) => 1,
            Delivery::Missed(n) => *n,
        }
    }
}

/// Fan-out of notifications to any number of subscribers
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, notification: Notification) {
        // No subscribers is not an error: the browser may be hidden.
        if self.sender.send(notification).is_err() {
            trace!("Notification published without subscribers");
        }
    }

    /// Subscribe to notifications originating from `document`
    pub fn subscribe(&self, document: DocumentId) -> Subscription {
        Subscription {
            document,
            receiver: self.sender.subscribe(),
        }
    }

    /// Live subscriptions; each one is released when dropped
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiving end of the notification stream for one document
#[derive(Debug)]
pub struct Subscription {
    document: DocumentId,
    receiver: broadcast::Receiver<Notification>,
}

impl Subscription {
    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Wait for the next delivery; `None` once the hub is gone
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(n) if n.origin == self.document => return Some(Delivery::Notification(n)),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => return Some(Delivery::Missed(missed)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take a pending delivery without waiting
    pub fn try_next(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.try_recv() {
                Ok(n) if n.origin == self.document => return Some(Delivery::Notification(n)),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => return Some(Delivery::Missed(missed)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
