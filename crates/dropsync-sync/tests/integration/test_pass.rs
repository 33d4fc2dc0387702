//! Reconciliation pass behavior

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use dropsync_core::domain::{KeyPrefix, SourceItem};
use dropsync_sync::engine::{Reconciler, ReconcilerOptions};
use dropsync_sync::PassError;

use crate::common::{self, at, Call, FakeDestination, FakeSource, Gate};

async fn run(reconciler: &Reconciler) -> Result<dropsync_sync::engine::PassReport, PassError> {
    let cancel = CancellationToken::new();
    reconciler
        .run_pass(&common::root(), &common::prefix(), &cancel)
        .await
}

fn setup() -> (Arc<FakeSource>, Arc<FakeDestination>, Reconciler) {
    let source = FakeSource::new();
    let destination = FakeDestination::new();
    let reconciler = common::reconciler(&source, &destination, ReconcilerOptions::default());
    (source, destination, reconciler)
}

#[tokio::test]
async fn test_first_pass_uploads_every_file() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    source.put_file("docs/b.md", at(2025, 1, 2), b"beta");

    let report = run(&reconciler).await.expect("pass failed");

    assert_eq!(report.items_considered, 2);
    assert_eq!(report.uploaded, vec!["bkp/a.txt", "bkp/docs/b.md"]);
    assert_eq!(report.unchanged, 0);
    assert!(report.deleted.is_empty());
    assert!(!report.dry_run);

    assert_eq!(destination.keys(), vec!["bkp/a.txt", "bkp/docs/b.md"]);
    assert_eq!(destination.object("bkp/a.txt").unwrap().content, b"alpha");
}

#[tokio::test]
async fn test_upload_carries_provenance_metadata() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 6, 15), b"alpha");

    run(&reconciler).await.expect("pass failed");

    let object = destination.object("bkp/a.txt").unwrap();
    assert_eq!(
        object.metadata,
        vec![
            ("source".to_string(), "dropbox".to_string()),
            ("source-modified".to_string(), "2025-06-15T00:00:00Z".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_custom_origin_is_recorded() {
    let source = FakeSource::new();
    let destination = FakeDestination::new();
    let reconciler = common::reconciler(
        &source,
        &destination,
        ReconcilerOptions {
            origin: "team-drive".to_string(),
            ..ReconcilerOptions::default()
        },
    );
    source.put_file("a.txt", at(2025, 6, 15), b"alpha");

    run(&reconciler).await.expect("pass failed");

    let object = destination.object("bkp/a.txt").unwrap();
    assert_eq!(object.metadata[0].1, "team-drive");
}

#[tokio::test]
async fn test_second_pass_without_changes_is_a_no_op() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    source.put_file("b/c.txt", at(2025, 1, 1), b"gamma");

    run(&reconciler).await.expect("first pass failed");
    destination.clear_calls();

    let report = run(&reconciler).await.expect("second pass failed");

    assert!(report.uploaded.is_empty());
    assert!(report.deleted.is_empty());
    assert_eq!(report.unchanged, 2);
    assert!(destination.puts().is_empty());
    assert!(destination.deletes().is_empty());
    assert_eq!(
        source.downloads().len(),
        2,
        "no downloads on the second pass"
    );
}

#[tokio::test]
async fn test_example_scenario_upload_and_prune_within_prefix() {
    let (source, destination, reconciler) = setup();
    source.put_file("a/b.txt", at(2025, 1, 1), b"hello");
    destination.insert("bkp/old.txt", b"stale", at(2024, 1, 1));
    destination.insert("other/keep.txt", b"unrelated", at(2024, 1, 1));

    let report = run(&reconciler).await.expect("pass failed");

    assert_eq!(report.uploaded, vec!["bkp/a/b.txt"]);
    assert_eq!(report.deleted, vec!["bkp/old.txt"]);
    assert_eq!(destination.keys(), vec!["bkp/a/b.txt", "other/keep.txt"]);
    assert_eq!(
        destination.calls().last(),
        Some(&Call::Delete("bkp/old.txt".to_string()))
    );
}

#[tokio::test]
async fn test_keys_outside_prefix_are_never_touched() {
    let (source, destination, reconciler) = setup();
    destination.insert("bkp-other/x.txt", b"x", at(2024, 1, 1));
    destination.insert("y.txt", b"y", at(2024, 1, 1));

    let report = run(&reconciler).await.expect("pass failed");

    assert!(report.deleted.is_empty());
    assert_eq!(destination.keys(), vec!["bkp-other/x.txt", "y.txt"]);
    assert!(destination
        .calls()
        .iter()
        .all(|call| matches!(call, Call::List(prefix) if prefix == "bkp/")));
}

#[tokio::test]
async fn test_newer_source_is_reuploaded() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 3, 1), b"new!!");
    destination.insert("bkp/a.txt", b"old!!", at(2025, 1, 1));

    let report = run(&reconciler).await.expect("pass failed");

    assert_eq!(report.uploaded, vec!["bkp/a.txt"]);
    assert_eq!(destination.object("bkp/a.txt").unwrap().content, b"new!!");
}

#[tokio::test]
async fn test_size_change_is_reuploaded_even_when_destination_is_newer() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"longer content");
    destination.insert("bkp/a.txt", b"short", at(2025, 6, 1));

    let report = run(&reconciler).await.expect("pass failed");

    assert_eq!(report.uploaded, vec!["bkp/a.txt"]);
}

#[tokio::test]
async fn test_same_size_older_source_is_in_sync() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"12345");
    destination.insert("bkp/a.txt", b"abcde", at(2025, 1, 1));

    let report = run(&reconciler).await.expect("pass failed");

    assert!(report.uploaded.is_empty());
    assert_eq!(report.unchanged, 1);
    assert_eq!(destination.object("bkp/a.txt").unwrap().content, b"abcde");
}

#[tokio::test]
async fn test_object_without_metadata_is_reuploaded() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    destination.insert_without_metadata("bkp/a.txt", b"alpha");

    let report = run(&reconciler).await.expect("pass failed");

    assert_eq!(report.uploaded, vec!["bkp/a.txt"]);
}

#[tokio::test]
async fn test_removed_source_file_is_deleted_exactly_once() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    source.put_file("b.txt", at(2025, 1, 1), b"beta");
    run(&reconciler).await.expect("first pass failed");

    source.remove_file("b.txt");
    let report = run(&reconciler).await.expect("second pass failed");
    assert_eq!(report.deleted, vec!["bkp/b.txt"]);

    let report = run(&reconciler).await.expect("third pass failed");
    assert!(report.deleted.is_empty());

    assert_eq!(destination.deletes(), vec!["bkp/b.txt"]);
    assert_eq!(destination.keys(), vec!["bkp/a.txt"]);
}

#[tokio::test]
async fn test_duplicate_relative_paths_keep_last_entry() {
    let (source, destination, reconciler) = setup();
    let item = |absolute: &str| SourceItem {
        absolute_path: absolute.to_string(),
        relative_path: "a.txt".to_string(),
        modified_at: at(2025, 1, 1),
        size_bytes: 5,
    };
    source.push_item(item("/Apps/data/A.txt"), b"first");
    source.push_item(item("/Apps/data/a.txt"), b"later");

    let report = run(&reconciler).await.expect("pass failed");

    assert_eq!(report.items_considered, 1);
    assert_eq!(destination.object("bkp/a.txt").unwrap().content, b"later");
}

#[tokio::test]
async fn test_empty_prefix_mirrors_into_bucket_root() {
    let source = FakeSource::new();
    let destination = FakeDestination::new();
    let reconciler = common::reconciler(&source, &destination, ReconcilerOptions::default());
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    destination.insert("stale.txt", b"x", at(2024, 1, 1));

    let cancel = CancellationToken::new();
    let report = reconciler
        .run_pass(&common::root(), &KeyPrefix::empty(), &cancel)
        .await
        .expect("pass failed");

    assert_eq!(report.uploaded, vec!["a.txt"]);
    assert_eq!(report.deleted, vec!["stale.txt"]);
}

#[tokio::test]
async fn test_many_files_with_concurrency() {
    let source = FakeSource::new();
    let destination = FakeDestination::new();
    let reconciler = common::reconciler(
        &source,
        &destination,
        ReconcilerOptions {
            max_concurrency: 8,
            ..ReconcilerOptions::default()
        },
    );
    for i in 0..50 {
        let relative = format!("dir{}/file{i}.bin", i % 5);
        source.put_file(&relative, at(2025, 1, 1), &[i as u8; 10]);
    }
    for i in 0..20 {
        destination.insert(&format!("bkp/gone{i}.bin"), b"x", at(2024, 1, 1));
    }

    let report = run(&reconciler).await.expect("pass failed");

    assert_eq!(report.uploaded.len(), 50);
    assert_eq!(report.deleted.len(), 20);
    assert_eq!(destination.keys().len(), 50);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_source_list_failure_mutates_nothing() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    destination.insert("bkp/old.txt", b"stale", at(2024, 1, 1));
    source.fail_next_lists(1);

    let err = run(&reconciler).await.unwrap_err();

    assert!(matches!(err, PassError::SourceList { .. }), "got {err:?}");
    assert!(destination.calls().is_empty());
    assert_eq!(destination.keys(), vec!["bkp/old.txt"]);
}

#[tokio::test]
async fn test_upload_failure_prevents_deletes() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    destination.insert("bkp/old.txt", b"stale", at(2024, 1, 1));
    destination.fail_put_on("bkp/a.txt");

    let err = run(&reconciler).await.unwrap_err();

    assert!(matches!(err, PassError::Upload { .. }), "got {err:?}");
    assert_eq!(err.key(), Some("bkp/a.txt"));
    assert_eq!(destination.lists(), 0);
    assert!(destination.deletes().is_empty());
    assert!(destination.object("bkp/old.txt").is_some());
}

#[tokio::test]
async fn test_download_failure_is_upload_error() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    source.fail_download_of("a.txt");

    let err = run(&reconciler).await.unwrap_err();

    assert!(matches!(err, PassError::Upload { .. }), "got {err:?}");
    assert_eq!(err.key(), Some("bkp/a.txt"));
    assert!(destination.puts().is_empty());
}

#[tokio::test]
async fn test_head_failure_is_inspect_error() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    destination.fail_head_on("bkp/a.txt");

    let err = run(&reconciler).await.unwrap_err();

    assert!(matches!(err, PassError::Inspect { .. }), "got {err:?}");
    assert_eq!(err.key(), Some("bkp/a.txt"));
    assert!(destination.puts().is_empty());
    assert_eq!(destination.lists(), 0);
}

#[tokio::test]
async fn test_destination_list_failure_deletes_nothing() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    destination.insert("bkp/old.txt", b"stale", at(2024, 1, 1));
    destination.fail_list();

    let err = run(&reconciler).await.unwrap_err();

    assert!(
        matches!(err, PassError::DestinationList { .. }),
        "got {err:?}"
    );
    assert!(destination.deletes().is_empty());
    assert_eq!(destination.puts(), vec!["bkp/a.txt"]);
}

#[tokio::test]
async fn test_delete_failure_fails_the_pass() {
    let (source, destination, reconciler) = setup();
    destination.insert("bkp/old.txt", b"stale", at(2024, 1, 1));
    destination.fail_delete_on("bkp/old.txt");

    let err = run(&reconciler).await.unwrap_err();

    assert!(matches!(err, PassError::Delete { .. }), "got {err:?}");
    assert_eq!(err.key(), Some("bkp/old.txt"));
    assert_eq!(source.list_calls(), 1);
}

// ============================================================================
// Dry run
// ============================================================================

#[tokio::test]
async fn test_dry_run_plans_without_mutating() {
    let source = FakeSource::new();
    let destination = FakeDestination::new();
    let reconciler = common::reconciler(
        &source,
        &destination,
        ReconcilerOptions {
            dry_run: true,
            ..ReconcilerOptions::default()
        },
    );
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    destination.insert("bkp/old.txt", b"stale", at(2024, 1, 1));

    let report = run(&reconciler).await.expect("dry run failed");

    assert!(report.dry_run);
    assert_eq!(report.uploaded, vec!["bkp/a.txt"]);
    assert_eq!(report.deleted, vec!["bkp/old.txt"]);
    assert!(destination.puts().is_empty());
    assert!(destination.deletes().is_empty());
    assert!(source.downloads().is_empty());
    assert_eq!(
        destination.calls(),
        vec![
            Call::Head("bkp/a.txt".to_string()),
            Call::List("bkp/".to_string()),
        ]
    );
    assert_eq!(destination.keys(), vec!["bkp/old.txt"]);
}

// ============================================================================
// Cancellation and exclusivity
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let (source, destination, reconciler) = setup();
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = reconciler
        .run_pass(&common::root(), &common::prefix(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PassError::Cancelled));
    assert!(destination.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_during_upload_stops_before_deletes() {
    let source = FakeSource::new();
    let destination = FakeDestination::new();
    let reconciler = common::reconciler(
        &source,
        &destination,
        ReconcilerOptions {
            max_concurrency: 1,
            ..ReconcilerOptions::default()
        },
    );
    source.put_file("a.txt", at(2025, 1, 1), b"alpha");
    source.put_file("b.txt", at(2025, 1, 1), b"beta");
    destination.insert("bkp/old.txt", b"stale", at(2024, 1, 1));

    let cancel = CancellationToken::new();
    destination.cancel_on_put(cancel.clone());

    let err = reconciler
        .run_pass(&common::root(), &common::prefix(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PassError::Cancelled), "got {err:?}");
    assert_eq!(destination.puts().len(), 1);
    assert_eq!(destination.lists(), 0);
    assert!(destination.deletes().is_empty());
}

#[tokio::test]
async fn test_concurrent_pass_is_rejected() {
    let source = FakeSource::new();
    let destination = FakeDestination::new();
    let reconciler = Arc::new(common::reconciler(
        &source,
        &destination,
        ReconcilerOptions::default(),
    ));
    let gate = Arc::new(Gate::default());
    source.set_gate(gate.clone());

    let first = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            reconciler
                .run_pass(&common::root(), &common::prefix(), &cancel)
                .await
        })
    };
    gate.entered.notified().await;

    let err = run(&reconciler).await.unwrap_err();
    assert!(matches!(err, PassError::AlreadyRunning), "got {err:?}");

    gate.release.notify_one();
    first
        .await
        .expect("task panicked")
        .expect("first pass failed");

    // The guard is released once the first pass ends.
    let gate = Arc::new(Gate::default());
    gate.release.notify_one();
    source.set_gate(gate);
    run(&reconciler).await.expect("pass after release failed");
}
