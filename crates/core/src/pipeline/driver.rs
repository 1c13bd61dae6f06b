//! Pipeline driver: one full or incremental run over declared containers.
//!
//! Strictly sequential: inputs are processed one at a time, entries within a
//! container one at a time. Ordering only matters *inside* an archive stream
//! and inside a method's injected calls; container order is incidental.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    reconcile_archive, reconcile_tree, ChangeSet, ChangeStatus, PipelineResult, RunMode,
    UnitTransform,
};
use crate::profile::{Stopwatch, TaskTiming};
use crate::trace::{phase_end, phase_start};

/// One declared input container and its output location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Archive { input: PathBuf, output: PathBuf },
    Tree { input: PathBuf, output: PathBuf },
}

impl Container {
    pub fn input(&self) -> &Path {
        match self {
            Container::Archive { input, .. } | Container::Tree { input, .. } => input,
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            Container::Archive { output, .. } | Container::Tree { output, .. } => output,
        }
    }
}

/// Per-run change information, supplied by the build collaborator.
///
/// Lookups are total: anything the tracker does not know about is
/// `Unchanged`.
pub trait ChangeTracker {
    /// Status of a whole input archive.
    fn archive_status(&self, input: &Path) -> ChangeStatus;

    /// Changed files of one input tree, as absolute paths under `input_root`.
    fn tree_changes(&self, input_root: &Path) -> ChangeSet;
}

/// Tracker that reports everything unchanged. Full runs ignore statuses, so
/// this is the natural tracker to pair with `RunMode::Full`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChanges;

impl ChangeTracker for NoChanges {
    fn archive_status(&self, _input: &Path) -> ChangeStatus {
        ChangeStatus::Unchanged
    }

    fn tree_changes(&self, _input_root: &Path) -> ChangeSet {
        ChangeSet::new()
    }
}

/// Timing report for one pipeline run: the phase as a whole plus one record
/// per container (named by its input path) so callers can rank the most
/// expensive containers.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub phase: TaskTiming,
    pub containers: Vec<TaskTiming>,
}

/// One pipeline run over a set of containers.
pub struct Pipeline<'a> {
    pub mode: RunMode,
    pub containers: &'a [Container],
    pub tracker: &'a dyn ChangeTracker,
    pub transform: Option<&'a dyn UnitTransform>,
}

impl Pipeline<'_> {
    /// Execute the run and return its timing report.
    pub fn run(&self, phase: &str) -> PipelineResult<RunReport> {
        phase_start(phase);
        let watch = Stopwatch::start(phase);

        let Some(transform) = self.transform else {
            // An absent transform is an intentional no-op pass, not an error.
            info!("no transform function configured; nothing to do");
            let timing = watch.stop();
            phase_end(phase);
            return Ok(RunReport { phase: timing, containers: Vec::new() });
        };

        if self.mode == RunMode::Full {
            clear_outputs(self.containers)?;
        }

        let mut container_timings = Vec::with_capacity(self.containers.len());
        for container in self.containers {
            let container_watch = Stopwatch::start(container.input().display().to_string());
            match container {
                Container::Archive { input, output } => reconcile_archive(
                    input,
                    output,
                    self.mode,
                    self.tracker.archive_status(input),
                    Some(transform),
                )?,
                Container::Tree { input, output } => reconcile_tree(
                    input,
                    output,
                    self.mode,
                    &self.tracker.tree_changes(input),
                    Some(transform),
                )?,
            }
            container_timings.push(container_watch.stop());
        }

        let timing = watch.stop();
        info!(transform = transform.name(), "{} took {:.3} ms", phase, timing.total_ms);
        phase_end(phase);
        Ok(RunReport { phase: timing, containers: container_timings })
    }
}

/// Remove all declared outputs ahead of a full run.
fn clear_outputs(containers: &[Container]) -> PipelineResult<()> {
    for container in containers {
        let output = container.output();
        match container {
            Container::Archive { .. } => match fs::remove_file(output) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            },
            Container::Tree { .. } => {
                match fs::remove_dir_all(output) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
                fs::create_dir_all(output)?;
            }
        }
    }
    Ok(())
}
