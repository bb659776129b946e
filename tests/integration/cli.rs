use sprig::config::SprigConfig;
use sprig::error::ApiError;
use sprig::tooling::cli::{CliContext, Commands};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn config(state_dir: &Path) -> SprigConfig {
    let mut config = SprigConfig::default();
    config.state.file = Some(state_dir.join("view-state.json"));
    config
}

fn context(workspace: &Path, state_dir: &Path) -> CliContext {
    let mut cli = CliContext::with_config(workspace.to_path_buf(), config(state_dir)).unwrap();
    cli.set_color(false);
    cli
}

fn workspace() -> (TempDir, TempDir) {
    let workspace = TempDir::new().unwrap();
    fs::create_dir_all(workspace.path().join("A/B")).unwrap();
    fs::write(workspace.path().join("A/inner.txt"), "i").unwrap();
    fs::write(workspace.path().join("a.txt"), "a").unwrap();
    (workspace, TempDir::new().unwrap())
}

#[test]
fn tree_lists_top_level_rows() {
    let (ws, state) = workspace();
    let cli = context(ws.path(), state.path());
    let output = cli.execute(&Commands::Tree).unwrap();
    assert_eq!(output, "▸ A\n  a.txt\n");
}

#[test]
fn expansion_persists_between_invocations() {
    let (ws, state) = workspace();
    {
        let cli = context(ws.path(), state.path());
        cli.execute(&Commands::Expand {
            paths: vec![PathBuf::from("A")],
        })
        .unwrap();
    }
    let cli = context(ws.path(), state.path());
    let output = cli.execute(&Commands::Tree).unwrap();
    assert!(output.contains("▾ A\n"));
    assert!(output.contains("  inner.txt\n"));
}

#[test]
fn touch_with_name_creates_and_renames() {
    let (ws, state) = workspace();
    let cli = context(ws.path(), state.path());
    let output = cli
        .execute(&Commands::Touch {
            parent: Some(PathBuf::from("A")),
            name: Some("notes.md".to_string()),
        })
        .unwrap();
    assert!(output.starts_with("Created"));
    assert!(ws.path().join("A/notes.md").is_file());
    assert!(!ws.path().join("A/untitled").exists());
}

#[test]
fn drop_into_descendant_is_reported_as_refused() {
    let (ws, state) = workspace();
    let cli = context(ws.path(), state.path());
    let output = cli
        .execute(&Commands::Drop {
            sources: vec![PathBuf::from("A")],
            onto: Some(PathBuf::from("A/B")),
            copy: false,
            external: false,
            trash: false,
        })
        .unwrap();
    assert!(output.contains("InvalidContainment"));
    assert!(ws.path().join("A/B").is_dir());
}

#[test]
fn mv_and_rm_report_batches() {
    let (ws, state) = workspace();
    let cli = context(ws.path(), state.path());
    let output = cli
        .execute(&Commands::Mv {
            sources: vec![PathBuf::from("a.txt")],
            to: PathBuf::from("A/B"),
        })
        .unwrap();
    assert!(output.starts_with("Moved: 1 completed"));
    assert!(ws.path().join("A/B/a.txt").is_file());

    let output = cli
        .execute(&Commands::Rm {
            paths: vec![PathBuf::from("A/B/a.txt")],
        })
        .unwrap();
    assert!(output.starts_with("Deleted: 1 completed"));
    assert!(!ws.path().join("A/B/a.txt").exists());
}

#[test]
fn unknown_path_is_an_error() {
    let (ws, state) = workspace();
    let cli = context(ws.path(), state.path());
    let err = cli
        .execute(&Commands::Rename {
            path: PathBuf::from("missing.txt"),
            name: "x".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::PathNotFound(_)));
}
