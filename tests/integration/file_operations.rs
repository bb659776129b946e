use crate::integration::support::Fixture;
use sprig::browser::{Command, CommandOutcome, SelectionAction};
use sprig::error::FsError;
use sprig::view::ViewUpdate;
use std::fs;

#[test]
fn create_inside_expanded_folder_inserts_at_sorted_index() {
    let fx = Fixture::new();
    fs::write(fx.path("A/zeta.txt"), "z").unwrap();
    fx.store.rescan(&fx.path("A")).unwrap();
    let a = fx.id("A");
    assert!(fx.browser.expand(a));
    fx.take_updates();

    let node = fx.browser.create_file(a).unwrap();

    assert!(fx.path("A/untitled").is_file());
    // B (folder), untitled, zeta.txt
    assert_eq!(
        fx.take_updates(),
        vec![ViewUpdate::Insert {
            parent: a,
            index: 1,
            node,
            animation: sprig::view::Animation::Slide,
        }]
    );
    let view = fx.browser.view();
    let view = view.lock();
    assert_eq!(view.selection(), &[node]);
    assert_eq!(view.editing().map(|s| s.node), Some(node));
}

#[test]
fn rename_commits_and_keeps_identity() {
    let fx = Fixture::new();
    let b = fx.id("b.txt");
    assert!(fx.browser.rename(b, "c.txt").unwrap());

    assert!(fx.path("c.txt").is_file());
    assert!(!fx.path("b.txt").exists());
    assert_eq!(fx.id("c.txt"), b);
    assert_eq!(fx.row_names(), vec!["A", "a.txt", "c.txt"]);
}

#[test]
fn rename_into_existing_name_fails_and_restores() {
    let fx = Fixture::new();
    let b = fx.id("b.txt");
    let err = fx.browser.rename(b, "a.txt").unwrap_err();
    assert!(matches!(err, FsError::NameCollision(_)));
    assert!(fx.path("b.txt").is_file());
    assert_eq!(fx.row_names(), vec!["A", "a.txt", "b.txt"]);
}

#[test]
fn duplicate_twice_numbers_copies() {
    let fx = Fixture::new();
    let a = fx.id("A");
    let first = fx.browser.duplicate_items(&[a]);
    let second = fx.browser.duplicate_items(&[a]);
    assert!(first.is_clean() && second.is_clean());
    assert!(fx.path("A copy/B").is_dir());
    assert!(fx.path("A copy 2/B").is_dir());
}

#[test]
fn selection_actions_resolve_against_selection() {
    let fx = Fixture::new();
    let a_txt = fx.id("a.txt");
    let b_txt = fx.id("b.txt");
    fx.browser.select(&[a_txt, b_txt]);

    let command = fx.browser.resolve_action(SelectionAction::Delete).unwrap();
    assert_eq!(
        command,
        Command::Delete {
            nodes: vec![a_txt, b_txt]
        }
    );
    match fx.browser.execute(command) {
        CommandOutcome::Batch(batch) => assert_eq!(batch.completed.len(), 2),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(fx.row_names(), vec!["A"]);
}

#[test]
fn copy_from_outside_the_tree() {
    let fx = Fixture::new();
    let outside = tempfile::tempdir().unwrap();
    fs::write(outside.path().join("x.txt"), "x").unwrap();

    let batch = fx
        .browser
        .copy_items(&[outside.path().join("x.txt")], fx.id("A"));

    assert!(batch.is_clean());
    assert_eq!(fs::read_to_string(fx.path("A/x.txt")).unwrap(), "x");
    assert!(outside.path().join("x.txt").is_file());
}
