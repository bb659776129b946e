//! Host view-state store: named slots of JSON values that outlive a session.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Slot-keyed storage for window and view state
pub trait ViewStateStore: Send + Sync {
    fn load_slot(&self, slot: &str) -> Option<Value>;

    fn store_slot(&self, slot: &str, value: Value) -> Result<(), ApiError>;

    /// Remove a slot; absent and empty mean the same thing to readers
    fn clear_slot(&self, slot: &str) -> Result<(), ApiError>;
}

/// State kept for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    slots: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.slots.read().contains_key(slot)
    }
}

impl ViewStateStore for MemoryStateStore {
    fn load_slot(&self, slot: &str) -> Option<Value> {
        self.slots.read().get(slot).cloned()
    }

    fn store_slot(&self, slot: &str, value: Value) -> Result<(), ApiError> {
        self.slots.write().insert(slot.to_string(), value);
        Ok(())
    }

    fn clear_slot(&self, slot: &str) -> Result<(), ApiError> {
        self.slots.write().remove(slot);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    slots: BTreeMap<String, Value>,
}

/// State persisted as one JSON document, rewritten on every change
#[derive(Debug)]
pub struct JsonStateFile {
    path: PathBuf,
    document: RwLock<StateDocument>,
}

impl JsonStateFile {
    /// Open the file, starting empty when it does not exist or cannot be parsed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ApiError> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = ?path, error = %e, "Ignoring unreadable view state");
                StateDocument::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateDocument::default(),
            Err(e) => return Err(ApiError::Io(e)),
        };
        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the file was last written
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.document.read().saved_at
    }

    fn save(&self, document: &mut StateDocument) -> Result<(), ApiError> {
        document.saved_at = Some(Utc::now());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*document)?;
        fs::write(&self.path, json)?;
        debug!(path = ?self.path, slots = document.slots.len(), "Saved view state");
        Ok(())
    }
}

impl ViewStateStore for JsonStateFile {
    fn load_slot(&self, slot: &str) -> Option<Value> {
        self.document.read().slots.get(slot).cloned()
    }

    fn store_slot(&self, slot: &str, value: Value) -> Result<(), ApiError> {
        let mut document = self.document.write();
        document.slots.insert(slot.to_string(), value);
        self.save(&mut document)
    }

    fn clear_slot(&self, slot: &str) -> Result<(), ApiError> {
        let mut document = self.document.write();
        if document.slots.remove(slot).is_none() {
            return Ok(());
        }
        self.save(&mut document)
    }
}
