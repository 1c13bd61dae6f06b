//! Incremental transform pipeline.
//!
//! A pipeline run reconciles input containers (jar archives and class
//! directories) against their output locations, pushing each qualifying
//! compiled unit through a pluggable transform. Incremental runs act only on
//! units whose change status demands it; full runs clear outputs and rebuild
//! everything.

pub mod archive;
pub mod driver;
pub mod tree;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classfile::ClassError;

pub use archive::reconcile_archive;
pub use driver::{ChangeTracker, Container, NoChanges, Pipeline, RunReport};
pub use tree::{output_path_for, reconcile_tree};

/// File suffix identifying a compiled unit under the default policy.
pub const CLASS_SUFFIX: &str = ".class";

/// Error type for pipeline operations.
///
/// I/O failures are carried unwrapped so callers can distinguish failure
/// kinds (permissions, missing parents, disk full) from malformed input.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying filesystem or stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input archive cannot be decoded.
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// An archive entry name would escape the output root.
    #[error("Unsafe archive entry name: {0}")]
    UnsafeEntryName(String),

    /// A file submitted for reconciliation is not under its input root.
    #[error("Path {file} is not under input root {root}")]
    OutsideRoot { file: PathBuf, root: PathBuf },

    /// Class rewriting failed for one unit.
    #[error("Rewrite of {unit} failed: {source}")]
    Rewrite {
        unit: String,
        #[source]
        source: ClassError,
    },
}

impl From<zip::result::ZipError> for PipelineError {
    /// Unwrap zip's stream-layer wrapper so the underlying failure kind
    /// survives; everything else is a malformed archive.
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => PipelineError::Io(io),
            other => PipelineError::MalformedArchive(other.to_string()),
        }
    }
}

impl From<walkdir::Error> for PipelineError {
    fn from(err: walkdir::Error) -> Self {
        let msg = err.to_string();
        match err.into_io_error() {
            Some(io) => PipelineError::Io(io),
            None => PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg)),
        }
    }
}

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Per-unit delta classification driving incremental processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Unchanged,
    Added,
    Changed,
    Removed,
}

/// Run mode as a tagged variant; output clearing belongs to `Full` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Incremental,
}

/// Change statuses for the files of one tree container.
///
/// Lookups are total: a path with no recorded status is `Unchanged`, by
/// construction rather than by null-coalescing at every call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: Vec<(PathBuf, ChangeStatus)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status for a path. Later records win on duplicate paths.
    pub fn record(&mut self, path: impl Into<PathBuf>, status: ChangeStatus) {
        self.entries.push((path.into(), status));
    }

    /// Status of a path; `Unchanged` when nothing was recorded.
    pub fn status_of(&self, path: &Path) -> ChangeStatus {
        self.entries
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, status)| *status)
            .unwrap_or(ChangeStatus::Unchanged)
    }

    /// Recorded entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, ChangeStatus)> {
        self.entries.iter().map(|(p, s)| (p.as_path(), *s))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The transform capability: classify units by name and rewrite the bytes of
/// qualifying ones. The pipeline is parametric over this; the entry-monitor
/// instrumenter is one concrete implementation.
pub trait UnitTransform: Send + Sync {
    /// Registry name for this transform.
    fn name(&self) -> &'static str;

    /// Whether a unit takes part in transformation. The default policy keeps
    /// compiled units and drops everything else; implementors may narrow it.
    fn qualifies(&self, unit_name: &str) -> bool {
        unit_name.ends_with(CLASS_SUFFIX)
    }

    /// Consume `input` and produce the transformed unit on `output`.
    fn transform(
        &self,
        unit_name: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> PipelineResult<()>;
}

/// Identity transform: copies qualifying units through unchanged. Useful for
/// validating container reconciliation without touching bytecode.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransform;

impl UnitTransform for CopyTransform {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn transform(
        &self,
        _unit_name: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> PipelineResult<()> {
        std::io::copy(input, output)?;
        Ok(())
    }
}

/// Registry of named transforms; callers select by name.
#[derive(Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Box<dyn UnitTransform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self { transforms: HashMap::new() }
    }

    pub fn register<T: UnitTransform + 'static>(&mut self, transform: T) -> &mut Self {
        self.transforms.insert(transform.name().to_string(), Box::new(transform));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn UnitTransform> {
        self.transforms.get(name).map(|t| &**t)
    }

    /// Sorted transform names for error messages/help.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.transforms.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registry populated with the built-in transforms.
pub fn default_transform_registry(monitor: crate::instrument::MonitorSpec) -> TransformRegistry {
    let mut registry = TransformRegistry::new();
    registry.register(crate::instrument::EntryInstrumenter::new(monitor));
    registry.register(CopyTransform);
    registry
}
