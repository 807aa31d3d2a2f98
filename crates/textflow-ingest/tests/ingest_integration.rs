//! On-disk ingestion: order, failures, generations and directory picks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use textflow_ingest::{
    DatasetState, IngestError, IngestOptions, Selection, SelectionTracker, ingest, ingest_tracked,
    row_count,
};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn merges_files_in_selection_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.csv", "h,a\n1,2\n");
    let b = write(dir.path(), "b.csv", "h,b\n3,4\n");

    let ab = ingest(&Selection::from_paths([&a, &b]), &IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(ab.merged_text, "h,a\n1,2\n3,4");
    assert_eq!(ab.total_rows, 2);
    assert_eq!(ab.submission_filename(), "Bulk_Merge_2_files.csv");

    let ba = ingest(&Selection::from_paths([&b, &a]), &IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(ba.merged_text, "h,b\n3,4\n1,2");
    assert_eq!(ba.total_rows, 2);
}

#[tokio::test]
async fn unchanged_selection_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..8)
        .map(|i| write(dir.path(), &format!("part{i}.csv"), &format!("id,v\n{i},x\n{i},y")))
        .collect();
    let selection = Selection::from_paths(&paths);

    let first = ingest(&selection, &IngestOptions::default()).await.unwrap();
    let second = ingest(&selection, &IngestOptions::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total_rows, 16);
    assert_eq!(first.line_count(), 17);
    assert_eq!(first.header(), "id,v");
}

#[tokio::test]
async fn non_csv_names_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let report = write(dir.path(), "report.txt", "not,a\ncsv,file");
    let data = write(dir.path(), "data.csv", "h\n1\n2");

    let err = ingest(&Selection::from_paths([&report]), &IngestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::NoValidFiles));

    let result = ingest(
        &Selection::from_paths([&report, &data]),
        &IngestOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(result.merged_text, "h\n1\n2");
    assert_eq!(result.sources, vec!["data.csv"]);
    assert_eq!(result.submission_filename(), "data.csv");
}

#[tokio::test]
async fn one_failed_read_aborts_everything() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write(dir.path(), "ok.csv", "h\n1");
    let missing = dir.path().join("missing.csv");

    let err = ingest(
        &Selection::from_paths([&ok, &missing]),
        &IngestOptions::default(),
    )
    .await
    .unwrap_err();
    match err {
        IngestError::Read { name, .. } => assert_eq!(name, "missing.csv"),
        other => panic!("expected Read error, got {other:?}"),
    }
}

#[tokio::test]
async fn state_survives_failed_reselection() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.csv", "h\n1\n2");
    let broken = dir.path().join("broken.csv");
    std::fs::write(&broken, [0x68u8, 0x0a, 0xff]).unwrap();

    let mut state = DatasetState::new();
    assert!(
        state
            .load(Selection::from_paths([&good]), &IngestOptions::default())
            .await
            .unwrap()
    );

    let err = state
        .load(
            Selection::from_paths([&good, &broken]),
            &IngestOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Decode { .. }));
    assert_eq!(state.result().unwrap().total_rows, 2);
    assert_eq!(state.selection().unwrap().len(), 1);
}

#[tokio::test]
async fn newer_selection_wins() {
    let dir = tempfile::tempdir().unwrap();
    let old = write(dir.path(), "old.csv", "h\nold");
    let new = write(dir.path(), "new.csv", "h\nnew");

    let tracker = SelectionTracker::new();
    let old_selection = Selection::from_paths([&old]);
    let old_ticket = tracker.begin();
    let new_selection = Selection::from_paths([&new]);
    let new_ticket = tracker.begin();

    let options = IngestOptions::default();
    let (old_result, new_result) = tokio::join!(
        ingest_tracked(&old_selection, &old_ticket, &options),
        ingest_tracked(&new_selection, &new_ticket, &options),
    );
    assert!(old_result.unwrap_err().is_superseded());
    assert_eq!(new_result.unwrap().merged_text, "h\nnew");
}

#[tokio::test]
async fn directory_selection() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "2024/q2.csv", "h\n3");
    write(dir.path(), "2024/q1.csv", "h\n1\n2");
    write(dir.path(), "README.md", "# data");
    write(dir.path(), "__MACOSX/2024/._q1.csv", "resource fork");

    let selection = Selection::from_directory(dir.path()).unwrap();
    assert_eq!(selection.skipped_names(), vec!["README.md"]);

    let result = ingest(
        &selection,
        &IngestOptions {
            read_timeout: Some(Duration::from_secs(5)),
        },
    )
    .await
    .unwrap();
    assert_eq!(result.sources, vec!["q1.csv", "q2.csv"]);
    assert_eq!(result.merged_text, "h\n1\n2\n3");
    assert_eq!(result.total_rows, row_count("h\n1\n2") + row_count("h\n3"));
}

/// A named pipe with no writer: reading it blocks until [`release`] runs.
#[cfg(unix)]
fn stalled(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let status = std::process::Command::new("mkfifo")
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());
    path
}

/// Let the blocked reader finish so the runtime can shut down.
#[cfg(unix)]
fn release(pipe: &Path) {
    drop(
        std::fs::OpenOptions::new()
            .write(true)
            .open(pipe)
            .unwrap(),
    );
}

#[cfg(unix)]
#[tokio::test]
async fn stalled_file_hits_read_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write(dir.path(), "ok.csv", "h\n1");
    let stuck = stalled(dir.path(), "stuck.csv");

    let err = ingest(
        &Selection::from_paths([&ok, &stuck]),
        &IngestOptions {
            read_timeout: Some(Duration::from_millis(200)),
        },
    )
    .await
    .unwrap_err();
    release(&stuck);

    match err {
        IngestError::ReadTimeout { name, timeout } => {
            assert_eq!(name, "stuck.csv");
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("expected ReadTimeout, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn reselecting_cancels_reads_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let stuck = stalled(dir.path(), "stuck.csv");

    let tracker = SelectionTracker::new();
    let ticket = tracker.begin();
    let selection = Selection::from_paths([&stuck]);
    let options = IngestOptions { read_timeout: None };

    let (result, ()) = tokio::join!(ingest_tracked(&selection, &ticket, &options), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _newer = tracker.begin();
    });
    release(&stuck);

    assert!(result.unwrap_err().is_superseded());
    assert!(ticket.cancel_token().is_cancelled());
}

#[cfg(unix)]
#[tokio::test]
async fn interrupted_load_keeps_committed_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "good.csv", "h\n1");
    let stuck = stalled(dir.path(), "stuck.csv");
    let options = IngestOptions { read_timeout: None };

    let mut state = DatasetState::new();
    assert!(
        state
            .load(Selection::from_paths([&good]), &options)
            .await
            .unwrap()
    );
    let committed = state.generation();

    let tracker = state.tracker();
    let (outcome, ()) = tokio::join!(state.load(Selection::from_paths([&stuck]), &options), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tracker.invalidate();
    });
    release(&stuck);

    assert!(!outcome.unwrap());
    assert_eq!(state.generation(), committed);
    assert_eq!(state.result().unwrap().merged_text, "h\n1");
    assert!(state.pending_selection().is_none());
}
