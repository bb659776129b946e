use sprig::browser::Browser;
use sprig::expansion::ExpansionSet;
use sprig::state::JsonStateFile;
use sprig::store::{DirectoryStore, FsDirectoryStore};
use sprig::tree::ScanConfig;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn open(workspace: &Path) -> (Arc<FsDirectoryStore>, Browser) {
    let store = Arc::new(FsDirectoryStore::open(workspace, ScanConfig::default(), 64).unwrap());
    let browser = Browser::new(store.clone(), false);
    (store, browser)
}

fn expanded_names(browser: &Browser) -> Vec<String> {
    let view = browser.view();
    let view = view.lock();
    view.rows()
        .iter()
        .filter(|r| r.expanded)
        .map(|r| r.name.clone())
        .collect()
}

#[test]
fn expansion_survives_reopening() {
    let workspace = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    let state_path = state_dir.path().join("view-state.json");
    fs::create_dir_all(workspace.path().join("A/B/C")).unwrap();
    fs::create_dir_all(workspace.path().join("D")).unwrap();

    {
        let (store, browser) = open(workspace.path());
        let root = store.root_location();
        browser.expand(store.lookup(&root.join("A")).unwrap());
        browser.expand(store.lookup(&root.join("A/B")).unwrap());
        let state = JsonStateFile::open(&state_path).unwrap();
        browser
            .with_view(|tree, view| ExpansionSet::capture(view, tree))
            .save(&state)
            .unwrap();
    }

    let (store, browser) = open(workspace.path());
    let state = JsonStateFile::open(&state_path).unwrap();
    assert!(state.saved_at().is_some());
    let restored = ExpansionSet::load(&state).apply(&*store, &browser.view());

    assert_eq!(restored.len(), 2);
    assert_eq!(expanded_names(&browser), vec!["A", "B"]);
}

#[test]
fn stale_entries_are_skipped() {
    let workspace = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    let state_path = state_dir.path().join("view-state.json");
    fs::create_dir_all(workspace.path().join("A")).unwrap();
    fs::create_dir_all(workspace.path().join("gone")).unwrap();

    {
        let (store, browser) = open(workspace.path());
        let root = store.root_location();
        browser.expand(store.lookup(&root.join("A")).unwrap());
        browser.expand(store.lookup(&root.join("gone")).unwrap());
        let state = JsonStateFile::open(&state_path).unwrap();
        browser
            .with_view(|tree, view| ExpansionSet::capture(view, tree))
            .save(&state)
            .unwrap();
    }
    fs::remove_dir(workspace.path().join("gone")).unwrap();

    let (store, browser) = open(workspace.path());
    let state = JsonStateFile::open(&state_path).unwrap();
    let restored = ExpansionSet::load(&state).apply(&*store, &browser.view());
    assert_eq!(restored.len(), 1);
    assert_eq!(expanded_names(&browser), vec!["A"]);
}

#[test]
fn nothing_expanded_leaves_no_slot() {
    let workspace = TempDir::new().unwrap();
    let state_dir = TempDir::new().unwrap();
    let state_path = state_dir.path().join("view-state.json");
    fs::create_dir_all(workspace.path().join("A")).unwrap();

    let (_store, browser) = open(workspace.path());
    let state = JsonStateFile::open(&state_path).unwrap();
    let set = browser.with_view(|tree, view| ExpansionSet::capture(view, tree));
    assert!(set.is_empty());
    set.save(&state).unwrap();

    let reopened = JsonStateFile::open(&state_path).unwrap();
    assert!(ExpansionSet::load(&reopened).is_empty());
}
