//! Filesystem-backed directory store

use super::notifications::{ChangeEvent, Notification, NotificationHub, Subscription};
use super::{DirectoryStore, SharedTree};
use crate::error::FsError;
use crate::tree::node::{split_extension, validate_name};
use crate::tree::{canonical_location, MergeSummary, ScanConfig, Scanner};
use crate::types::{DocumentId, NodeId};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Point-in-time copy of the node fields a mutation needs, taken under a
/// short read lock so no lock is held across filesystem calls.
struct Snapshot {
    location: PathBuf,
    name: String,
    writable: bool,
    container: bool,
    parent: Option<NodeId>,
}

/// Directory store over a real directory on disk.
///
/// Mutations and re-scans are serialized on `mutations`, held from the
/// filesystem call through the tree update, so a watcher re-scan never sees
/// the disk ahead of the tree.
pub struct FsDirectoryStore {
    document: DocumentId,
    tree: SharedTree,
    scanner: Scanner,
    hub: NotificationHub,
    mutations: Mutex<()>,
}

impl FsDirectoryStore {
    /// Scan `root` and open a store over it
    pub fn open(
        root: &Path,
        scan_config: ScanConfig,
        notification_capacity: usize,
    ) -> Result<Self, FsError> {
        let root = dunce::canonicalize(root).map_err(|e| FsError::from_io(root, e))?;
        let scanner = Scanner::new(scan_config);
        let tree = scanner.scan(&root)?;
        info!(root = ?root, nodes = tree.len(), "Opened directory store");
        Ok(Self {
            document: DocumentId::next(),
            tree: Arc::new(RwLock::new(tree)),
            scanner,
            hub: NotificationHub::new(notification_capacity),
            mutations: Mutex::new(()),
        })
    }

    pub fn root_location(&self) -> PathBuf {
        self.tree.read().root_location().to_path_buf()
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    fn snapshot(&self, id: NodeId) -> Result<Snapshot, FsError> {
        let tree = self.tree.read();
        let node = tree.get(id).ok_or(FsError::StaleNode(id))?;
        Ok(Snapshot {
            location: node.location().to_path_buf(),
            name: node.name().to_string(),
            writable: node.is_writable(),
            container: node.is_directory(),
            parent: node.parent(),
        })
    }

    fn writable_container(&self, id: NodeId) -> Result<Snapshot, FsError> {
        let snapshot = self.snapshot(id)?;
        if !snapshot.container {
            return Err(FsError::NotADirectory(snapshot.location));
        }
        if !snapshot.writable {
            return Err(FsError::NotWritable(snapshot.location));
        }
        Ok(snapshot)
    }

    fn publish(&self, event: ChangeEvent, external: bool) {
        self.hub.publish(Notification {
            origin: self.document,
            event,
            external,
        });
    }

    fn create_entry(&self, parent: NodeId, name: &str, folder: bool) -> Result<NodeId, FsError> {
        validate_name(name)?;
        let _guard = self.mutations.lock();
        let parent_snapshot = self.writable_container(parent)?;
        let path = parent_snapshot.location.join(name);
        let created = if folder {
            fs::create_dir(&path)
        } else {
            fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map(drop)
        };
        created.map_err(|e| FsError::from_io(&path, e))?;

        let entry = self.scanner.entry_for(&path)?;
        let id = self.tree.write().insert_child(parent, entry)?;
        info!(path = ?path, folder, "Created item");
        self.publish(ChangeEvent::Created(path), false);
        Ok(id)
    }

    /// Copy `source` to `destination` on disk and mirror the copy in the tree.
    /// The caller holds `mutations`.
    fn place_copy(&self, source: &Path, destination: &Path) -> Result<NodeId, FsError> {
        copy_recursively(source, destination)?;
        let id = {
            let mut tree = self.tree.write();
            self.scanner.populate(&mut tree, destination, true)?;
            tree.locate(destination)
                .ok_or_else(|| FsError::NotFound(destination.to_path_buf()))?
        };
        info!(from = ?source, to = ?destination, "Copied item");
        self.publish(ChangeEvent::Created(destination.to_path_buf()), false);
        Ok(id)
    }

    /// Re-scan the directory that holds `location`, preserving node identity.
    ///
    /// Walks up from `location` to the nearest directory node that still
    /// exists on disk, so a directory removed externally invalidates its
    /// whole subtree.
    pub fn rescan(&self, location: &Path) -> Result<MergeSummary, FsError> {
        let _guard = self.mutations.lock();
        let target = {
            let tree = self.tree.read();
            let mut candidate = Some(location);
            let mut found = None;
            while let Some(path) = candidate {
                let directory = tree
                    .locate(path)
                    .filter(|id| tree.get(*id).is_some_and(|n| n.is_directory()));
                if let Some(id) = directory {
                    if path.is_dir() {
                        found = Some((id, path.to_path_buf()));
                        break;
                    }
                }
                candidate = path.parent();
            }
            found
        };

        let Some((dir, dir_location)) = target else {
            debug!(location = ?location, "Change outside the browsed tree");
            return Ok(MergeSummary::default());
        };
        let fresh = self.scanner.scan(&dir_location)?;
        let summary = self.tree.write().merge_rescan(dir, &fresh, fresh.root())?;
        debug!(
            directory = ?dir_location,
            preserved = summary.preserved,
            added = summary.added,
            removed = summary.removed,
            "Re-scanned directory"
        );
        Ok(summary)
    }

    /// Fold an externally observed change into the tree and relay it
    pub fn apply_external(&self, event: ChangeEvent) -> Result<MergeSummary, FsError> {
        let mut summary = MergeSummary::default();
        for path in event.paths() {
            summary.absorb(self.rescan(path)?);
        }
        self.publish(event, true);
        Ok(summary)
    }
}

impl DirectoryStore for FsDirectoryStore {
    fn document(&self) -> DocumentId {
        self.document
    }

    fn tree(&self) -> SharedTree {
        Arc::clone(&self.tree)
    }

    fn create_file(&self, parent: NodeId, name: &str) -> Result<NodeId, FsError> {
        self.create_entry(parent, name, false)
    }

    fn create_folder(&self, parent: NodeId, name: &str) -> Result<NodeId, FsError> {
        self.create_entry(parent, name, true)
    }

    fn rename(&self, node: NodeId, new_name: &str) -> Result<NodeId, FsError> {
        validate_name(new_name)?;
        let _guard = self.mutations.lock();
        let snapshot = self.snapshot(node)?;
        let parent = snapshot
            .parent
            .ok_or_else(|| FsError::NotWritable(snapshot.location.clone()))?;
        if new_name == snapshot.name {
            return Ok(node);
        }
        let parent_snapshot = self.writable_container(parent)?;
        let destination = parent_snapshot.location.join(new_name);

        // A case-only rename on a case-insensitive volume finds the item itself
        let existing = self.tree.read().child_named(parent, new_name);
        let occupied = destination.symlink_metadata().is_ok()
            && !same_entry(&snapshot.location, &destination);
        if existing.is_some_and(|id| id != node) || occupied {
            return Err(FsError::NameCollision(destination));
        }

        fs::rename(&snapshot.location, &destination)
            .map_err(|e| FsError::from_io(&snapshot.location, e))?;
        self.tree.write().rename(node, new_name)?;
        info!(from = ?snapshot.location, to = ?destination, "Renamed item");
        self.publish(
            ChangeEvent::Renamed {
                from: snapshot.location,
                to: destination,
            },
            false,
        );
        Ok(node)
    }

    fn move_node(&self, node: NodeId, target: NodeId) -> Result<NodeId, FsError> {
        let _guard = self.mutations.lock();
        let snapshot = self.snapshot(node)?;
        let parent = snapshot
            .parent
            .ok_or_else(|| FsError::NotWritable(snapshot.location.clone()))?;
        let target_snapshot = self.snapshot(target)?;
        if !target_snapshot.container {
            return Err(FsError::NotADirectory(target_snapshot.location));
        }
        if self.tree.read().is_same_or_ancestor(node, target) {
            return Err(FsError::InvalidContainment {
                item: snapshot.location,
                target: target_snapshot.location,
            });
        }
        if parent == target {
            return Ok(node);
        }
        if !target_snapshot.writable {
            return Err(FsError::NotWritable(target_snapshot.location));
        }
        let parent_snapshot = self.snapshot(parent)?;
        if !parent_snapshot.writable {
            return Err(FsError::NotWritable(parent_snapshot.location));
        }
        let destination = target_snapshot.location.join(&snapshot.name);
        if destination.symlink_metadata().is_ok() {
            return Err(FsError::NameCollision(destination));
        }

        fs::rename(&snapshot.location, &destination)
            .map_err(|e| FsError::from_io(&snapshot.location, e))?;
        self.tree.write().reparent(node, target)?;
        info!(from = ?snapshot.location, to = ?destination, "Moved item");
        self.publish(
            ChangeEvent::Renamed {
                from: snapshot.location,
                to: destination,
            },
            false,
        );
        Ok(node)
    }

    fn copy(&self, source: &Path, target: NodeId) -> Result<NodeId, FsError> {
        let _guard = self.mutations.lock();
        let target_snapshot = self.writable_container(target)?;
        let metadata =
            fs::symlink_metadata(source).map_err(|e| FsError::from_io(source, e))?;
        let source = canonical_location(source);
        let source = source.as_path();
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FsError::InvalidName(source.to_string_lossy().into_owned()))?;
        if target_snapshot.location.starts_with(source) {
            return Err(FsError::InvalidContainment {
                item: source.to_path_buf(),
                target: target_snapshot.location,
            });
        }

        let same_folder = source.parent() == Some(target_snapshot.location.as_path());
        let name = if same_folder {
            let (stem, extension) = if metadata.is_file() {
                split_extension(&name)
            } else {
                (name.as_str(), None)
            };
            self.tree
                .read()
                .unique_child_name(target, &format!("{} copy", stem), extension)
        } else {
            name
        };
        let destination = target_snapshot.location.join(&name);
        if destination.symlink_metadata().is_ok() {
            return Err(FsError::NameCollision(destination));
        }
        self.place_copy(source, &destination)
    }

    fn duplicate(&self, node: NodeId) -> Result<NodeId, FsError> {
        let _guard = self.mutations.lock();
        let snapshot = self.snapshot(node)?;
        let parent = snapshot
            .parent
            .ok_or_else(|| FsError::NotWritable(snapshot.location.clone()))?;
        let parent_snapshot = self.writable_container(parent)?;
        let name = self
            .tree
            .read()
            .duplicate_name(node)
            .ok_or(FsError::StaleNode(node))?;
        let destination = parent_snapshot.location.join(name);
        self.place_copy(&snapshot.location, &destination)
    }

    fn delete(&self, node: NodeId) -> Result<(), FsError> {
        let _guard = self.mutations.lock();
        let snapshot = self.snapshot(node)?;
        let parent = snapshot
            .parent
            .ok_or_else(|| FsError::NotWritable(snapshot.location.clone()))?;
        if !snapshot.writable {
            return Err(FsError::NotWritable(snapshot.location));
        }
        let parent_snapshot = self.snapshot(parent)?;
        if !parent_snapshot.writable {
            return Err(FsError::NotWritable(parent_snapshot.location));
        }

        let metadata = fs::symlink_metadata(&snapshot.location)
            .map_err(|e| FsError::from_io(&snapshot.location, e))?;
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&snapshot.location)
        } else {
            fs::remove_file(&snapshot.location)
        };
        removed.map_err(|e| FsError::from_io(&snapshot.location, e))?;

        let dropped = self.tree.write().remove(node)?;
        info!(path = ?snapshot.location, nodes = dropped.len(), "Deleted item");
        self.publish(ChangeEvent::Removed(snapshot.location), false);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe(self.document)
    }
}

/// Copy a file, link or directory tree. On failure whatever was already
/// written under `destination` is removed again.
fn copy_recursively(source: &Path, destination: &Path) -> Result<(), FsError> {
    let mut created = false;
    let result = copy_entries(source, destination, &mut created);
    if result.is_err() && created {
        if let Err(e) = remove_entry(destination) {
            warn!(path = ?destination, error = %e, "Could not remove partial copy");
        }
    }
    result
}

/// Sets `created` once `destination` itself exists
fn copy_entries(source: &Path, destination: &Path, created: &mut bool) -> Result<(), FsError> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source.to_path_buf());
            match e.into_io_error() {
                Some(err) => FsError::from_io(path, err),
                None => FsError::Io {
                    path,
                    source: io::Error::new(io::ErrorKind::Other, "filesystem loop"),
                },
            }
        })?;
        let target = if entry.depth() == 0 {
            destination.to_path_buf()
        } else {
            match entry.path().strip_prefix(source) {
                Ok(relative) => destination.join(relative),
                Err(_) => continue,
            }
        };
        let file_type = entry.file_type();
        let copied = if file_type.is_dir() {
            fs::create_dir(&target)
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)
        } else {
            fs::copy(entry.path(), &target).map(drop)
        };
        if let Err(e) = copied {
            warn!(path = ?target, error = %e, "Copy failed");
            return Err(FsError::from_io(&target, e));
        }
        if entry.depth() == 0 {
            *created = true;
        }
    }
    Ok(())
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Both paths name the same directory entry (e.g. differing only in case on
/// a case-insensitive volume)
#[cfg(unix)]
fn same_entry(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_entry(a: &Path, b: &Path) -> bool {
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn copy_link(source: &Path, destination: &Path) -> io::Result<()> {
    let target = fs::read_link(source)?;
    std::os::unix::fs::symlink(target, destination)
}

#[cfg(not(unix))]
fn copy_link(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination).map(drop)
}
