//! Reconciliation loop
//!
//! Subscribes to the directory store's notifications while the browser is
//! visible. Bursts are coalesced over a short window, then the view is
//! reloaded once and the selection re-resolved by identity. Every
//! notification is handled the same way, whoever caused it.

use crate::browser::{Browser, SharedView};
use crate::error::ApiError;
use crate::store::{DirectoryStore, Subscription};
use crate::types::NodeId;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Coalescing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// How long to keep gathering notifications after the first one
    pub batch_window_ms: u64,
    /// Reconcile early once this many notifications are pending
    pub max_batch_size: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: 50,
            max_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Full reloads performed
    pub reloads: u64,
    /// Notifications consumed, including ones reported as missed
    pub notifications: u64,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePass {
    pub notifications: u64,
    pub rows: usize,
    pub selection: Vec<NodeId>,
}

/// Called after every pass, on the loop's task
pub type ReconcileObserver = Arc<dyn Fn(&ReconcilePass) + Send + Sync>;

pub struct Reconciler {
    store: Arc<dyn DirectoryStore>,
    view: SharedView,
    config: ReconcileConfig,
    task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<RwLock<ReconcileStats>>,
    observer: Option<ReconcileObserver>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DirectoryStore>, view: SharedView, config: ReconcileConfig) -> Self {
        Self {
            store,
            view,
            config,
            task: Mutex::new(None),
            stats: Arc::new(RwLock::new(ReconcileStats::default())),
            observer: None,
        }
    }

    pub fn for_browser(browser: &Browser, config: ReconcileConfig) -> Self {
        Self::new(Arc::clone(browser.store()), browser.view(), config)
    }

    pub fn with_observer(mut self, observer: ReconcileObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the loop on the current tokio runtime; a no-op when already running
    pub fn start(&self) -> Result<(), ApiError> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        let runtime = Handle::try_current()
            .map_err(|e| ApiError::RuntimeError(format!("No tokio runtime: {}", e)))?;

        let subscription = self.store.subscribe();
        let store = Arc::clone(&self.store);
        let view = Arc::clone(&self.view);
        let config = self.config.clone();
        let stats = Arc::clone(&self.stats);
        let observer = self.observer.clone();
        *task = Some(runtime.spawn(async move {
            Self::run(subscription, store, view, config, stats, observer).await;
        }));

        info!(document = %self.store.document(), "Started reconciliation");
        Ok(())
    }

    /// Cancel the loop and wait until its subscription is released
    pub async fn stop(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            info!(document = %self.store.document(), "Stopped reconciliation");
        }
    }

    /// Follow the browser's visibility
    pub async fn set_visible(&self, visible: bool) -> Result<(), ApiError> {
        if visible {
            self.start()
        } else {
            self.stop().await;
            Ok(())
        }
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats.read().clone()
    }

    async fn run(
        mut subscription: Subscription,
        store: Arc<dyn DirectoryStore>,
        view: SharedView,
        config: ReconcileConfig,
        stats: Arc<RwLock<ReconcileStats>>,
        observer: Option<ReconcileObserver>,
    ) {
        let window = Duration::from_millis(config.batch_window_ms);
        let max_batch = config.max_batch_size.max(1) as u64;
        debug!(document = %subscription.document(), "Reconciliation loop started");

        while let Some(first) = subscription.next().await {
            let mut pending = first.weight();
            let mut closed = false;
            let deadline = tokio::time::sleep(window);
            tokio::pin!(deadline);

            while pending < max_batch {
                tokio::select! {
                    _ = &mut deadline => break,
                    next = subscription.next() => match next {
                        Some(delivery) => pending += delivery.weight(),
                        None => {
                            closed = true;
                            break;
                        }
                    },
                }
            }

            let pass = Self::reconcile(&*store, &view, &stats, pending);
            if let Some(observer) = &observer {
                observer(&pass);
            }
            if closed {
                break;
            }
        }
        debug!("Notification stream closed");
    }

    fn reconcile(
        store: &dyn DirectoryStore,
        view: &SharedView,
        stats: &RwLock<ReconcileStats>,
        notifications: u64,
    ) -> ReconcilePass {
        let tree = store.tree();
        let tree = tree.read();
        let mut view = view.lock();
        let snapshot = view.selection_snapshot();
        view.reload(&tree);
        let selection = view.restore_selection(&tree, &snapshot);

        {
            let mut stats = stats.write();
            stats.reloads += 1;
            stats.notifications += notifications;
        }
        debug!(
            notifications,
            rows = view.len(),
            selected = selection.len(),
            dropped = snapshot.len() - selection.len(),
            "Reconciled view"
        );
        ReconcilePass {
            notifications,
            rows: view.len(),
            selection,
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChangeEvent, FsDirectoryStore, Notification};
    use crate::tree::ScanConfig;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn open() -> (TempDir, Arc<FsDirectoryStore>, Browser, PathBuf) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("A")).unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();
        fs::write(temp.path().join("c.txt"), "c").unwrap();
        let store = Arc::new(FsDirectoryStore::open(temp.path(), ScanConfig::default(), 256).unwrap());
        let root = store.root_location();
        let browser = Browser::new(store.clone(), false);
        (temp, store, browser, root)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_reload() {
        let (_temp, store, browser, root) = open();
        let reconciler = Reconciler::for_browser(&browser, ReconcileConfig::default());
        reconciler.start().unwrap();

        for i in 0..50 {
            store.hub().publish(Notification {
                origin: store.document(),
                event: ChangeEvent::Modified(root.join(format!("f{}", i))),
                external: true,
            });
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = reconciler.stats();
        assert_eq!(stats.reloads, 1);
        assert_eq!(stats.notifications, 50);
        reconciler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_documents_are_ignored() {
        let (_temp, store, browser, root) = open();
        let reconciler = Reconciler::for_browser(&browser, ReconcileConfig::default());
        reconciler.start().unwrap();
        store.hub().publish(Notification {
            origin: crate::types::DocumentId::next(),
            event: ChangeEvent::Created(root.join("elsewhere")),
            external: false,
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reconciler.stats().reloads, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_start_stop_does_not_leak_subscriptions() {
        let (_temp, store, browser, _root) = open();
        let reconciler = Reconciler::for_browser(&browser, ReconcileConfig::default());
        for _ in 0..10 {
            reconciler.set_visible(true).await.unwrap();
            reconciler.set_visible(true).await.unwrap();
            assert_eq!(store.hub().subscriber_count(), 1);
            reconciler.set_visible(false).await.unwrap();
            reconciler.set_visible(false).await.unwrap();
        }
        assert_eq!(store.hub().subscriber_count(), 0);
        assert!(!reconciler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_survives_external_change() {
        let (_temp, store, browser, root) = open();
        let b = store.lookup(&root.join("b.txt")).unwrap();
        let c = store.lookup(&root.join("c.txt")).unwrap();
        browser.select(&[b, c]);

        let reconciler = Reconciler::for_browser(&browser, ReconcileConfig::default());
        reconciler.start().unwrap();

        fs::write(root.join("d.txt"), "d").unwrap();
        fs::remove_file(root.join("c.txt")).unwrap();
        store
            .apply_external(ChangeEvent::Created(root.join("d.txt")))
            .unwrap();
        store
            .apply_external(ChangeEvent::Removed(root.join("c.txt")))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(reconciler.stats().reloads, 1);
        assert_eq!(browser.selection(), vec![b]);
        let names: Vec<String> = browser
            .view()
            .lock()
            .rows()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(names, vec!["A", "b.txt", "d.txt"]);
        reconciler.stop().await;
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (_temp, _store, browser, _root) = open();
        let reconciler = Reconciler::for_browser(&browser, ReconcileConfig::default());
        assert!(matches!(reconciler.start(), Err(ApiError::RuntimeError(_))));
    }
}
