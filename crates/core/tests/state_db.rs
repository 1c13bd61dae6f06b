use std::fs;

use tempfile::TempDir;

use weave_core::pipeline::ChangeStatus;
use weave_core::state::{
    scan_tree, sha256_file, RunRecord, StateDb, StateError, UnitState,
};

fn pair(path: &str, hash: &str) -> (String, String) {
    (path.to_string(), hash.to_string())
}

#[test]
fn fresh_database_starts_empty_at_the_latest_schema() {
    let dir = TempDir::new().expect("tempdir");
    let db = StateDb::open(&dir.path().join("state.db")).expect("open");

    let version: i32 =
        db.connection().query_row("PRAGMA user_version;", [], |row| row.get(0)).expect("pragma");
    assert_eq!(version, 2);
    assert!(db.snapshot("libs/app.jar").expect("snapshot").is_empty());
    assert!(db.list_runs().expect("runs").is_empty());
}

#[test]
fn reopening_preserves_committed_state() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("state.db");

    let mut db = StateDb::open(&path).expect("open");
    db.commit_units("classes", &[pair("pkg/Foo.class", "aa"), pair("pkg/Bar.class", "bb")])
        .expect("commit");
    drop(db);

    let db = StateDb::open(&path).expect("reopen");
    assert_eq!(
        db.snapshot("classes").expect("snapshot"),
        vec![
            UnitState {
                container: "classes".to_string(),
                path: "pkg/Bar.class".to_string(),
                hash: "bb".to_string(),
            },
            UnitState {
                container: "classes".to_string(),
                path: "pkg/Foo.class".to_string(),
                hash: "aa".to_string(),
            },
        ]
    );
}

#[test]
fn newer_schema_versions_are_refused() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("state.db");

    let db = StateDb::open(&path).expect("open");
    db.connection().execute_batch("PRAGMA user_version = 99;").expect("bump version");
    drop(db);

    let err = StateDb::open(&path).expect_err("future schema");
    assert!(matches!(err, StateError::UnsupportedSchemaVersion { found: 99, .. }));
}

#[test]
fn diff_classifies_added_changed_and_removed() {
    let dir = TempDir::new().expect("tempdir");
    let mut db = StateDb::open(&dir.path().join("state.db")).expect("open");
    db.commit_units(
        "classes",
        &[pair("pkg/Same.class", "s1"), pair("pkg/Edited.class", "e1"), pair("pkg/Gone.class", "g1")],
    )
    .expect("commit");

    let current =
        [pair("pkg/Same.class", "s1"), pair("pkg/Edited.class", "e2"), pair("pkg/New.class", "n1")];
    let mut deltas = db.diff("classes", &current).expect("diff");
    deltas.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        deltas,
        vec![
            ("pkg/Edited.class".to_string(), ChangeStatus::Changed),
            ("pkg/Gone.class".to_string(), ChangeStatus::Removed),
            ("pkg/New.class".to_string(), ChangeStatus::Added),
        ]
    );
}

#[test]
fn diff_after_commit_is_empty() {
    let dir = TempDir::new().expect("tempdir");
    let mut db = StateDb::open(&dir.path().join("state.db")).expect("open");
    let scan = [pair("pkg/Foo.class", "f1"), pair("pkg/Bar.class", "b1")];

    db.commit_units("classes", &scan).expect("commit");
    assert!(db.diff("classes", &scan).expect("diff").is_empty());
}

#[test]
fn containers_are_tracked_independently() {
    let dir = TempDir::new().expect("tempdir");
    let mut db = StateDb::open(&dir.path().join("state.db")).expect("open");
    db.commit_units("a", &[pair("pkg/Foo.class", "f1")]).expect("commit a");
    db.commit_units("b", &[pair("pkg/Foo.class", "other")]).expect("commit b");

    assert!(db.diff("a", &[pair("pkg/Foo.class", "f1")]).expect("diff a").is_empty());
    assert_eq!(
        db.diff("b", &[pair("pkg/Foo.class", "f1")]).expect("diff b"),
        vec![("pkg/Foo.class".to_string(), ChangeStatus::Changed)]
    );
}

#[test]
fn archive_status_covers_every_transition() {
    let dir = TempDir::new().expect("tempdir");
    let mut db = StateDb::open(&dir.path().join("state.db")).expect("open");

    // Never seen, still absent.
    assert_eq!(db.archive_status("app.jar", None).expect("status"), ChangeStatus::Unchanged);
    // Never seen, now present.
    assert_eq!(db.archive_status("app.jar", Some("h1")).expect("status"), ChangeStatus::Added);

    // Archives are stored as a single empty-path unit.
    db.commit_units("app.jar", &[pair("", "h1")]).expect("commit");
    assert_eq!(db.archive_status("app.jar", Some("h1")).expect("status"), ChangeStatus::Unchanged);
    assert_eq!(db.archive_status("app.jar", Some("h2")).expect("status"), ChangeStatus::Changed);
    assert_eq!(db.archive_status("app.jar", None).expect("status"), ChangeStatus::Removed);
}

#[test]
fn run_records_round_trip_in_insertion_order() {
    let dir = TempDir::new().expect("tempdir");
    let db = StateDb::open(&dir.path().join("state.db")).expect("open");

    let first = RunRecord {
        mode: "full".to_string(),
        transform: "entry-monitor".to_string(),
        status: "ok".to_string(),
        started_at: "2026-08-26T10:00:00Z".to_string(),
        finished_at: "2026-08-26T10:00:01Z".to_string(),
        duration_ms: 1042.5,
    };
    let second = RunRecord {
        mode: "incremental".to_string(),
        transform: "entry-monitor".to_string(),
        status: "ok".to_string(),
        started_at: "2026-08-26T10:05:00Z".to_string(),
        finished_at: "2026-08-26T10:05:00Z".to_string(),
        duration_ms: 3.25,
    };

    let first_id = db.record_run(&first).expect("insert first");
    let second_id = db.record_run(&second).expect("insert second");
    assert!(second_id > first_id);
    assert_eq!(db.list_runs().expect("runs"), vec![first, second]);
}

#[test]
fn tree_scans_are_sorted_and_hash_content() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("classes");
    fs::create_dir_all(root.join("pkg")).expect("mkdir");
    fs::write(root.join("pkg/B.class"), b"bravo").expect("write");
    fs::write(root.join("pkg/A.class"), b"alpha").expect("write");

    let scan = scan_tree(&root).expect("scan");
    let paths: Vec<&str> = scan.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(paths, vec!["pkg/A.class", "pkg/B.class"]);
    assert_eq!(scan[0].1, sha256_file(&root.join("pkg/A.class")).expect("file hash"));
    assert_ne!(scan[0].1, scan[1].1, "different content hashes differently");

    fs::write(root.join("pkg/A.class"), b"alpha v2").expect("edit");
    let rescan = scan_tree(&root).expect("rescan");
    assert_ne!(rescan[0].1, scan[0].1, "edits change the hash");
}

#[test]
fn scanning_a_missing_root_yields_no_units() {
    let dir = TempDir::new().expect("tempdir");
    assert!(scan_tree(&dir.path().join("absent")).expect("scan").is_empty());
}
