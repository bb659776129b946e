//! Relays changes made on disk by other processes into a directory store

use super::fs::FsDirectoryStore;
use super::notifications::ChangeEvent;
use crate::error::ApiError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps a filesystem watch alive for as long as it is held
pub struct ExternalWatcher {
    _watcher: RecommendedWatcher,
}

impl ExternalWatcher {
    /// Watch the store's root recursively.
    ///
    /// Each observed change is re-scanned into the tree and published as an
    /// external notification. Dropping the watcher stops it.
    pub fn start(store: Arc<FsDirectoryStore>) -> Result<Self, ApiError> {
        let root = store.root_location();
        let relay = Arc::clone(&store);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if let Some(change) = convert_event(event) {
                        debug!(event = ?change, "External change");
                        if let Err(e) = relay.apply_external(change) {
                            warn!(error = %e, "Failed to apply external change");
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })
        .map_err(|e| ApiError::WatchError(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| ApiError::WatchError(format!("Failed to watch directory: {}", e)))?;

        info!(root = ?root, "Watching directory");
        Ok(Self { _watcher: watcher })
    }
}

pub(crate) fn convert_event(event: Event) -> Option<ChangeEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.first().map(|p| ChangeEvent::Created(p.clone())),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => match event.paths.as_slice() {
            [from, to, ..] => Some(ChangeEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            }),
            [only] => Some(ChangeEvent::Modified(only.clone())),
            [] => None,
        },
        EventKind::Modify(_) => event
            .paths
            .first()
            .map(|p| ChangeEvent::Modified(p.clone())),
        EventKind::Remove(_) => event.paths.first().map(|p| ChangeEvent::Removed(p.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    use std::path::PathBuf;

    #[test]
    fn test_convert_create_and_remove() {
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/w/a"));
        assert_eq!(
            convert_event(event),
            Some(ChangeEvent::Created(PathBuf::from("/w/a")))
        );

        let event =
            Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(PathBuf::from("/w/d"));
        assert_eq!(
            convert_event(event),
            Some(ChangeEvent::Removed(PathBuf::from("/w/d")))
        );
    }

    #[test]
    fn test_convert_rename_pair() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/old"))
            .add_path(PathBuf::from("/w/new"));
        assert_eq!(
            convert_event(event),
            Some(ChangeEvent::Renamed {
                from: PathBuf::from("/w/old"),
                to: PathBuf::from("/w/new"),
            })
        );
    }

    #[test]
    fn test_mutations_race_free_while_watching() {
        use crate::store::DirectoryStore;
        use crate::tree::ScanConfig;
        use std::time::Duration;

        let temp = tempfile::TempDir::new().unwrap();
        let store = Arc::new(FsDirectoryStore::open(temp.path(), ScanConfig::default(), 1024).unwrap());
        let _watcher = ExternalWatcher::start(Arc::clone(&store)).unwrap();
        let root_id = store.tree().read().root();
        let root = store.root_location();

        for i in 0..100 {
            let name = format!("dir{i:03}");
            let folder = store.create_folder(root_id, &name).unwrap();
            store.create_file(folder, "inner.txt").unwrap();
        }
        std::thread::sleep(Duration::from_millis(300));

        let tree = store.tree();
        let tree = tree.read();
        assert_eq!(tree.children(root_id).unwrap().len(), 100);
        for i in 0..100 {
            let folder = tree.locate(&root.join(format!("dir{i:03}"))).unwrap();
            assert_eq!(tree.children(folder).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_convert_ignores_access() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/w/a"));
        assert_eq!(convert_event(event), None);
    }
}
