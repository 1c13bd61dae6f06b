use std::fs;

use predicates::prelude::*;
use tempfile::tempdir;
use weave_core::config::WeaveLayout;
use weave_core::testutil::ClassBuilder;

/// The version banner reports the core library version.
#[test]
fn version_banner_reports_the_core_version() {
    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(weave_core::version()));
}

/// `init` should write the config and state database under the chosen root.
#[test]
fn init_writes_config_and_state_database() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("init")
        .arg("--root")
        .arg(root)
        .arg("--name")
        .arg("DemoProject")
        .assert()
        .success()
        .stdout(predicate::str::contains("DemoProject"));

    let layout = WeaveLayout::new(root);
    assert!(layout.config_path.exists(), "config at {}", layout.config_path.display());
    assert!(layout.state_db_path.exists(), "state db at {}", layout.state_db_path.display());
}

/// `init` without an explicit --root should use the current directory.
#[test]
fn init_uses_default_root_when_not_provided() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .current_dir(root)
        .arg("init")
        .arg("--name")
        .arg("CwdProject")
        .assert()
        .success();

    assert!(WeaveLayout::new(root).config_path.exists());
}

/// `status` must fail with a readable error when no project exists.
#[test]
fn status_fails_when_config_missing() {
    let dir = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("status")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read project config"));
}

/// `run` must fail the same way outside a project.
#[test]
fn run_fails_when_config_missing() {
    let dir = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("run")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read project config"));
}

/// An initialized project with no containers runs as a no-op.
#[test]
fn run_with_no_containers_is_a_no_op() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("init")
        .arg("--root")
        .arg(root)
        .assert()
        .success();

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("run")
        .arg("--root")
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("No containers configured"));
}

/// `runs` on a fresh project lists nothing.
#[test]
fn runs_lists_nothing_on_a_fresh_project() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("init")
        .arg("--root")
        .arg(root)
        .assert()
        .success();

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("runs")
        .arg("--root")
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Runs (0)"));
}

/// `inspect` prints class and method signatures for a loose class file.
#[test]
fn inspect_reports_methods_of_a_class_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("Foo.class");
    let bytes =
        ClassBuilder::new("pkg/Foo").method("handle", "(IJ)V").build().expect("fixture class");
    fs::write(&path, bytes).expect("write class");

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("inspect")
        .arg("--path")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg/Foo"))
        .stdout(predicate::str::contains("handle (IJ)V (2 param(s))"));
}

/// `inspect --json` emits a machine-readable report.
#[test]
fn inspect_json_is_parseable() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("Foo.class");
    let bytes =
        ClassBuilder::new("pkg/Foo$1").method("accept", "(Ljava/lang/Object;)V").build().expect("fixture");
    fs::write(&path, bytes).expect("write class");

    let output = assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("inspect")
        .arg("--path")
        .arg(&path)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(parsed[0]["name"], "pkg/Foo$1");
    assert_eq!(parsed[0]["nested"], true);
}

/// `inspect` on garbage must fail, not panic.
#[test]
fn inspect_rejects_non_class_input() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("garbage.class");
    fs::write(&path, b"not a class file").expect("write");

    assert_cmd::cargo::cargo_bin_cmd!("classweave")
        .arg("inspect")
        .arg("--path")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse"));
}
