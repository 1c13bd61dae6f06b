use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use weave_core::classfile::{ClassFile, CpEntry};
use weave_core::instrument::{EntryInstrumenter, MonitorSpec};
use weave_core::pipeline::{
    ChangeSet, ChangeStatus, ChangeTracker, Container, NoChanges, Pipeline, RunMode,
};
use weave_core::testutil::ClassBuilder;

struct ScriptedChanges {
    archive: ChangeStatus,
    tree: ChangeSet,
}

impl ChangeTracker for ScriptedChanges {
    fn archive_status(&self, _input: &Path) -> ChangeStatus {
        self.archive
    }

    fn tree_changes(&self, _input_root: &Path) -> ChangeSet {
        self.tree.clone()
    }
}

fn class_bytes(name: &str) -> Vec<u8> {
    ClassBuilder::new(name).method("handle", "(II)V").build().expect("fixture class")
}

fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(BufWriter::new(File::create(path).expect("create jar")));
    for (name, bytes) in entries {
        writer.start_file(*name, FileOptions::default()).expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

fn jar_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(File::open(path).expect("open jar")).expect("read jar");
    let mut entry = archive.by_name(name).expect("entry");
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).expect("read entry");
    bytes
}

/// Does the class name the monitor and inject before the original body?
fn assert_instrumented(bytes: &[u8], monitor_class: &str) {
    let class = ClassFile::parse(bytes).expect("parse instrumented class");
    let mentions = (1..class.pool.count()).any(|index| {
        matches!(class.pool.get(index), Ok(CpEntry::Class(name)) if class.pool.utf8(*name).ok() == Some(monitor_class))
    });
    assert!(mentions, "instrumented class must reference {monitor_class}");
}

/// A project with one jar (outer class plus a nested one) and one class tree.
struct Fixture {
    _dir: TempDir,
    jar_in: PathBuf,
    jar_out: PathBuf,
    tree_in: PathBuf,
    tree_out: PathBuf,
    containers: Vec<Container>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let jar_in = dir.path().join("libs/app.jar");
        let jar_out = dir.path().join("woven/app.jar");
        let tree_in = dir.path().join("classes");
        let tree_out = dir.path().join("woven-classes");

        fs::create_dir_all(jar_in.parent().expect("parent")).expect("mkdir");
        write_jar(
            &jar_in,
            &[
                ("pkg/Foo.class", class_bytes("pkg/Foo").as_slice()),
                ("pkg/Foo$1.class", class_bytes("pkg/Foo$1").as_slice()),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ],
        );

        fs::create_dir_all(tree_in.join("pkg")).expect("mkdir");
        fs::write(tree_in.join("pkg/Loose.class"), class_bytes("pkg/Loose")).expect("write");

        let containers = vec![
            Container::Archive { input: jar_in.clone(), output: jar_out.clone() },
            Container::Tree { input: tree_in.clone(), output: tree_out.clone() },
        ];
        Self { _dir: dir, jar_in, jar_out, tree_in, tree_out, containers }
    }

    fn pipeline<'a>(
        &'a self,
        mode: RunMode,
        tracker: &'a dyn ChangeTracker,
        transform: Option<&'a dyn weave_core::pipeline::UnitTransform>,
    ) -> Pipeline<'a> {
        Pipeline { mode, containers: &self.containers, tracker, transform }
    }
}

#[test]
fn full_run_rewrites_both_container_kinds() {
    let fixture = Fixture::new();
    let transform = EntryInstrumenter::new(MonitorSpec::default());
    let report = fixture
        .pipeline(RunMode::Full, &NoChanges, Some(&transform))
        .run("transform")
        .expect("run");
    assert_eq!(report.phase.name, "transform");
    assert!(report.phase.total_ms >= 0.0);

    // One timing record per container, named by its input.
    let timed: Vec<String> = report.containers.iter().map(|t| t.name.clone()).collect();
    assert_eq!(
        timed,
        vec![fixture.jar_in.display().to_string(), fixture.tree_in.display().to_string()]
    );

    let spec = MonitorSpec::default();
    assert_instrumented(&jar_entry(&fixture.jar_out, "pkg/Foo.class"), &spec.class);
    assert_instrumented(&jar_entry(&fixture.jar_out, "pkg/Foo$1.class"), &spec.class);
    assert_instrumented(
        &fs::read(fixture.tree_out.join("pkg/Loose.class")).expect("tree output"),
        &spec.class,
    );
}

#[test]
fn full_runs_are_idempotent() {
    let fixture = Fixture::new();
    let transform = EntryInstrumenter::new(MonitorSpec::default());

    fixture.pipeline(RunMode::Full, &NoChanges, Some(&transform)).run("first").expect("first");
    let first = jar_entry(&fixture.jar_out, "pkg/Foo.class");
    let first_loose = fs::read(fixture.tree_out.join("pkg/Loose.class")).expect("tree output");

    fixture.pipeline(RunMode::Full, &NoChanges, Some(&transform)).run("second").expect("second");
    assert_eq!(jar_entry(&fixture.jar_out, "pkg/Foo.class"), first);
    assert_eq!(
        fs::read(fixture.tree_out.join("pkg/Loose.class")).expect("tree output"),
        first_loose
    );
}

#[test]
fn full_run_clears_stale_outputs_first() {
    let fixture = Fixture::new();
    fs::create_dir_all(&fixture.tree_out).expect("mkdir");
    fs::write(fixture.tree_out.join("stale.class"), b"old").expect("seed stale");

    let transform = EntryInstrumenter::new(MonitorSpec::default());
    fixture.pipeline(RunMode::Full, &NoChanges, Some(&transform)).run("transform").expect("run");

    assert!(!fixture.tree_out.join("stale.class").exists());
    assert!(fixture.tree_out.join("pkg/Loose.class").exists());
}

#[test]
fn incremental_changed_everything_matches_a_full_run() {
    let full = Fixture::new();
    let incremental = Fixture::new();
    let transform = EntryInstrumenter::new(MonitorSpec::default());

    full.pipeline(RunMode::Full, &NoChanges, Some(&transform)).run("full").expect("full");

    let mut tree = ChangeSet::new();
    tree.record(incremental.tree_in.join("pkg/Loose.class"), ChangeStatus::Added);
    let tracker = ScriptedChanges { archive: ChangeStatus::Added, tree };
    incremental
        .pipeline(RunMode::Incremental, &tracker, Some(&transform))
        .run("incremental")
        .expect("incremental");

    assert_eq!(
        jar_entry(&incremental.jar_out, "pkg/Foo.class"),
        jar_entry(&full.jar_out, "pkg/Foo.class")
    );
    assert_eq!(
        fs::read(incremental.tree_out.join("pkg/Loose.class")).expect("incremental output"),
        fs::read(full.tree_out.join("pkg/Loose.class")).expect("full output")
    );
}

#[test]
fn incremental_unchanged_run_touches_nothing() {
    let fixture = Fixture::new();
    let transform = EntryInstrumenter::new(MonitorSpec::default());
    let tracker = ScriptedChanges { archive: ChangeStatus::Unchanged, tree: ChangeSet::new() };

    fixture
        .pipeline(RunMode::Incremental, &tracker, Some(&transform))
        .run("transform")
        .expect("run");

    assert!(!fixture.jar_out.exists());
    assert!(!fixture.tree_out.exists());
}

#[test]
fn incremental_removal_cleans_outputs() {
    let fixture = Fixture::new();
    let transform = EntryInstrumenter::new(MonitorSpec::default());
    fixture.pipeline(RunMode::Full, &NoChanges, Some(&transform)).run("seed").expect("seed");
    assert!(fixture.jar_out.exists());

    // Inputs disappeared; the tracker reports removals.
    fs::remove_file(&fixture.jar_in).expect("drop jar");
    let loose = fixture.tree_in.join("pkg/Loose.class");
    fs::remove_file(&loose).expect("drop class");

    let mut tree = ChangeSet::new();
    tree.record(loose, ChangeStatus::Removed);
    let tracker = ScriptedChanges { archive: ChangeStatus::Removed, tree };
    fixture
        .pipeline(RunMode::Incremental, &tracker, Some(&transform))
        .run("cleanup")
        .expect("cleanup");

    assert!(!fixture.jar_out.exists());
    assert!(!fixture.tree_out.join("pkg/Loose.class").exists());
}

#[test]
fn absent_transform_makes_the_run_a_no_op() {
    let fixture = Fixture::new();
    let report =
        fixture.pipeline(RunMode::Full, &NoChanges, None).run("transform").expect("run");
    assert_eq!(report.phase.name, "transform");
    assert!(report.containers.is_empty(), "no container work, no container timings");
    assert!(!fixture.jar_out.exists());
    assert!(!fixture.tree_out.exists());
}
