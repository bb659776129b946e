use crate::integration::support::Fixture;
use parking_lot::Mutex;
use sprig::reconcile::{ReconcileConfig, ReconcileObserver, ReconcilePass, Reconciler};
use sprig::store::ChangeEvent;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn external_change_reaches_the_view() {
    let fx = Fixture::new();
    let b_txt = fx.id("b.txt");
    fx.browser.select(&[b_txt]);

    let passes: Arc<Mutex<Vec<ReconcilePass>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = passes.clone();
    let observer: ReconcileObserver = Arc::new(move |pass: &ReconcilePass| sink.lock().push(pass.clone()));
    let reconciler = Reconciler::for_browser(&fx.browser, ReconcileConfig::default()).with_observer(observer);
    reconciler.start().unwrap();

    fs::write(fx.path("c.txt"), "c").unwrap();
    fx.store
        .apply_external(ChangeEvent::Created(fx.path("c.txt")))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fx.row_names(), vec!["A", "a.txt", "b.txt", "c.txt"]);
    assert_eq!(fx.browser.selection(), vec![b_txt]);
    let passes = passes.lock();
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].rows, 4);
    reconciler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn external_removal_drops_selection_of_missing_item() {
    let fx = Fixture::new();
    let a_txt = fx.id("a.txt");
    let b_txt = fx.id("b.txt");
    fx.browser.select(&[a_txt, b_txt]);
    let reconciler = Reconciler::for_browser(&fx.browser, ReconcileConfig::default());
    reconciler.start().unwrap();

    fs::remove_file(fx.path("a.txt")).unwrap();
    fx.store
        .apply_external(ChangeEvent::Removed(fx.path("a.txt")))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fx.row_names(), vec!["A", "b.txt"]);
    assert_eq!(fx.browser.selection(), vec![b_txt]);
    assert_eq!(reconciler.stats().reloads, 1);
    reconciler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn own_mutations_are_reconciled_without_losing_rows() {
    let fx = Fixture::new();
    let reconciler = Reconciler::for_browser(&fx.browser, ReconcileConfig::default());
    reconciler.start().unwrap();

    let root = fx.browser.tree().read().root();
    fx.browser.create_folder(root).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(fx.row_names(), vec!["A", "untitled folder", "a.txt", "b.txt"]);
    reconciler.stop().await;
    assert_eq!(fx.store.hub().subscriber_count(), 0);
}
