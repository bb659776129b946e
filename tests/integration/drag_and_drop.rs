use crate::integration::support::{set_read_only, Fixture};
use sprig::dnd::{DragPayload, DragSession, DropOperation, DropOutcome, DropProposal, DropRefusal, OperationMask};
use sprig::error::FsError;
use sprig::view::ViewUpdate;
use std::fs;
use tempfile::TempDir;

#[test]
fn external_file_dropped_onto_folder_is_copied() {
    let fx = Fixture::new();
    let outside = TempDir::new().unwrap();
    let source = outside.path().join("x.txt");
    fs::write(&source, "x").unwrap();
    let a = fx.id("A");

    let mut session = DragSession::new(DragPayload::external(vec![source.clone()]));
    let outcome = session.accept(&fx.browser, &DropProposal::onto(a));

    match &outcome {
        DropOutcome::Completed { operation, batch } => {
            assert_eq!(*operation, Some(DropOperation::Copy));
            assert!(batch.is_clean());
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(fx.path("A/x.txt").is_file());
    assert!(source.is_file());

    let copied = fx.id("A/x.txt");
    let updates = fx.take_updates();
    assert_eq!(updates.len(), 1);
    assert!(matches!(updates[0], ViewUpdate::Insert { parent, node, .. } if parent == a && node == copied));
}

#[test]
fn internal_drag_onto_folder_moves_with_one_update() {
    let fx = Fixture::new();
    let a = fx.id("A");
    let a_txt = fx.id("a.txt");
    fx.browser.expand(a);
    fx.take_updates();

    let mut session = fx.browser.begin_drag(&[a_txt], OperationMask::ALL);
    let outcome = session.accept(&fx.browser, &DropProposal::onto(a));

    assert!(outcome.succeeded());
    assert!(fx.path("A/a.txt").is_file());
    assert!(!fx.path("a.txt").exists());
    assert_eq!(fx.id("A/a.txt"), a_txt);

    let updates = fx.take_updates();
    assert_eq!(updates.len(), 1);
    assert!(!updates.iter().any(ViewUpdate::is_reload));
    assert!(matches!(
        updates[0],
        ViewUpdate::Move { node, from_parent, to_parent, .. }
            if node == a_txt && from_parent == fx.browser.tree().read().root() && to_parent == a
    ));
}

#[test]
fn folder_dropped_into_its_own_descendant_is_refused() {
    let fx = Fixture::new();
    let a = fx.id("A");
    let b = fx.id("A/B");

    let mut session = fx.browser.begin_drag(&[a], OperationMask::ALL);
    let outcome = session.accept(&fx.browser, &DropProposal::onto(b));

    assert!(matches!(outcome, DropOutcome::Refused(DropRefusal::InvalidContainment)));
    assert!(!session.is_finished());
    assert!(fx.path("A/B").is_dir());
    assert!(fx.take_updates().is_empty());
}

#[test]
fn folder_dropped_onto_itself_is_refused() {
    let fx = Fixture::new();
    let a = fx.id("A");
    let mut session = fx.browser.begin_drag(&[a], OperationMask::ALL);
    let outcome = session.accept(&fx.browser, &DropProposal::onto(a));
    assert!(matches!(outcome, DropOutcome::Refused(DropRefusal::InvalidContainment)));
}

#[test]
fn trash_drop_reports_partial_success() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("w.txt"), "w").unwrap();
    fs::write(temp.path().join("r.txt"), "r").unwrap();
    set_read_only(&temp.path().join("r.txt"));
    let fx = Fixture::open(temp);
    let w = fx.id("w.txt");
    let r = fx.id("r.txt");

    let mut session = fx.browser.begin_drag(&[w, r], OperationMask::ALL);
    let outcome = session.drop_on_trash(&fx.browser);

    let batch = outcome.batch().unwrap();
    assert_eq!(batch.completed, vec![w]);
    assert_eq!(batch.failed.len(), 1);
    assert!(matches!(batch.failed[0].error, FsError::NotWritable(_)));
    assert!(outcome.succeeded());
    assert!(!fx.path("w.txt").exists());
    assert!(fx.path("r.txt").exists());
    assert_eq!(fx.row_names(), vec!["r.txt"]);
}

#[test]
fn session_accepts_only_once() {
    let fx = Fixture::new();
    let a_txt = fx.id("a.txt");
    let a = fx.id("A");
    let mut session = fx.browser.begin_drag(&[a_txt], OperationMask::ALL);

    assert!(session.accept(&fx.browser, &DropProposal::onto(a)).succeeded());
    assert!(matches!(
        session.accept(&fx.browser, &DropProposal::root()),
        DropOutcome::Refused(DropRefusal::AlreadyAccepted)
    ));
}

#[test]
fn copy_modifier_copies_within_the_view() {
    let fx = Fixture::new();
    let a_txt = fx.id("a.txt");
    let a = fx.id("A");
    let mut session = fx.browser.begin_drag(&[a_txt], OperationMask::ALL);
    session.set_copy_modifier(true);

    let outcome = session.accept(&fx.browser, &DropProposal::onto(a));
    assert!(matches!(outcome, DropOutcome::Completed { operation: Some(DropOperation::Copy), .. }));
    assert!(fx.path("a.txt").is_file());
    assert!(fx.path("A/a.txt").is_file());
}
