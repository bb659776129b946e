use sprig::browser::Browser;
use sprig::store::{DirectoryStore, FsDirectoryStore};
use sprig::tree::ScanConfig;
use sprig::types::NodeId;
use sprig::view::ViewUpdate;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    pub _temp: TempDir,
    pub root: PathBuf,
    pub store: Arc<FsDirectoryStore>,
    pub browser: Browser,
}

impl Fixture {
    /// Root holding `A/` (with `A/B/` inside), `a.txt` and `b.txt`
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("A/B")).unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();
        Self::open(temp)
    }

    pub fn open(temp: TempDir) -> Self {
        let store = Arc::new(FsDirectoryStore::open(temp.path(), ScanConfig::default(), 256).unwrap());
        let root = store.root_location();
        let browser = Browser::new(store.clone(), false);
        Self {
            _temp: temp,
            root,
            store,
            browser,
        }
    }

    pub fn id(&self, relative: &str) -> NodeId {
        self.store
            .lookup(&self.root.join(relative))
            .unwrap_or_else(|| panic!("{} is not in the tree", relative))
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn take_updates(&self) -> Vec<ViewUpdate> {
        self.browser.view().lock().take_updates()
    }

    pub fn row_names(&self) -> Vec<String> {
        let view = self.browser.view();
        let view = view.lock();
        view.rows().iter().map(|r| r.name.clone()).collect()
    }
}

pub fn set_read_only(path: &Path) {
    let mut permissions = fs::metadata(path).unwrap().permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions).unwrap();
}
