//! Shared helpers for the classweave CLI.
//!
//! The CLI plays the build collaborator's role from the core's perspective:
//! it scans the declared inputs, diffs them against the build-state database
//! to produce change information, and commits the scan back after a
//! successful run.

pub mod commands;

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use weave_core::config::{WeaveConfig, WeaveLayout};
use weave_core::pipeline::{ChangeSet, ChangeStatus, ChangeTracker, Container};
use weave_core::state::{scan_tree, sha256_file, StateDb};

/// Canonicalize the root path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(root: &str) -> Result<PathBuf> {
    let path = Path::new(root);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Infer a project name from the root path.
pub fn infer_project_name(root: &Path) -> String {
    root.file_name().and_then(|os_str| os_str.to_str()).unwrap_or("unnamed-project").to_string()
}

/// Load the project config, choosing the parser by file extension
/// (`.yaml`/`.yml` vs JSON).
pub fn load_config(path: &Path) -> Result<WeaveConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read project config at {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&contents).context("Failed to parse project config YAML")
    } else {
        serde_json::from_str(&contents).context("Failed to parse project config JSON")
    }
}

/// Load the config and open the state database for a given layout.
pub fn open_project_state(layout: &WeaveLayout) -> Result<(WeaveConfig, PathBuf, StateDb)> {
    let config = load_config(&layout.config_path)?;
    let db_path = layout.state_db_for(&config);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state dir: {}", parent.display()))?;
    }
    let db = StateDb::open(&db_path)
        .with_context(|| format!("Failed to open state database at {}", db_path.display()))?;
    Ok((config, db_path, db))
}

/// Fresh scan of one declared container.
pub struct ScannedContainer {
    pub container: Container,
    /// State-database key: the declared input path.
    pub key: String,
    /// `(relative path, hash)` pairs; a whole archive is one row with an
    /// empty relative path, a missing input scans to no rows.
    pub units: Vec<(String, String)>,
    /// Whole-file hash for archives that exist on disk.
    pub archive_hash: Option<String>,
}

/// Hash the current contents of every declared container.
pub fn scan_containers(containers: &[Container]) -> Result<Vec<ScannedContainer>> {
    let mut scans = Vec::with_capacity(containers.len());
    for container in containers {
        let key = container.input().to_string_lossy().into_owned();
        let scan = match container {
            Container::Archive { input, .. } => {
                let archive_hash = if input.is_file() {
                    Some(sha256_file(input).with_context(|| {
                        format!("Failed to hash archive {}", input.display())
                    })?)
                } else {
                    None
                };
                let units = archive_hash
                    .iter()
                    .map(|hash| (String::new(), hash.clone()))
                    .collect();
                ScannedContainer { container: container.clone(), key, units, archive_hash }
            }
            Container::Tree { input, .. } => {
                let units = scan_tree(input)
                    .with_context(|| format!("Failed to scan directory {}", input.display()))?;
                ScannedContainer {
                    container: container.clone(),
                    key,
                    units,
                    archive_hash: None,
                }
            }
        };
        scans.push(scan);
    }
    Ok(scans)
}

/// Change information computed by diffing scans against the state database.
#[derive(Debug, Default)]
pub struct ComputedChanges {
    archive_status: HashMap<PathBuf, ChangeStatus>,
    tree_changes: HashMap<PathBuf, ChangeSet>,
}

impl ComputedChanges {
    /// Diff every scanned container against the stored snapshots.
    pub fn compute(db: &StateDb, scans: &[ScannedContainer]) -> Result<Self> {
        let mut changes = ComputedChanges::default();
        for scan in scans {
            match &scan.container {
                Container::Archive { input, .. } => {
                    let status = db
                        .archive_status(&scan.key, scan.archive_hash.as_deref())
                        .context("Failed to diff archive against state database")?;
                    changes.archive_status.insert(input.clone(), status);
                }
                Container::Tree { input, .. } => {
                    let deltas = db
                        .diff(&scan.key, &scan.units)
                        .context("Failed to diff directory against state database")?;
                    let mut set = ChangeSet::new();
                    for (relative, status) in deltas {
                        set.record(input.join(relative), status);
                    }
                    changes.tree_changes.insert(input.clone(), set);
                }
            }
        }
        Ok(changes)
    }

    /// Total number of non-`Unchanged` deltas across all containers.
    pub fn delta_count(&self) -> usize {
        let archive_deltas = self
            .archive_status
            .values()
            .filter(|status| **status != ChangeStatus::Unchanged)
            .count();
        let tree_deltas: usize = self.tree_changes.values().map(|set| set.len()).sum();
        archive_deltas + tree_deltas
    }

    /// Describe the deltas of one container for display.
    pub fn describe(&self, container: &Container) -> Vec<(String, ChangeStatus)> {
        match container {
            Container::Archive { input, .. } => self
                .archive_status
                .get(input)
                .filter(|status| **status != ChangeStatus::Unchanged)
                .map(|status| vec![(input.to_string_lossy().into_owned(), *status)])
                .unwrap_or_default(),
            Container::Tree { input, .. } => self
                .tree_changes
                .get(input)
                .map(|set| {
                    set.iter()
                        .map(|(path, status)| (path.to_string_lossy().into_owned(), status))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

impl ChangeTracker for ComputedChanges {
    fn archive_status(&self, input: &Path) -> ChangeStatus {
        self.archive_status.get(input).copied().unwrap_or(ChangeStatus::Unchanged)
    }

    fn tree_changes(&self, input_root: &Path) -> ChangeSet {
        self.tree_changes.get(input_root).cloned().unwrap_or_default()
    }
}

/// Commit every scan back to the state database after a successful run.
pub fn commit_scans(db: &mut StateDb, scans: &[ScannedContainer]) -> Result<()> {
    for scan in scans {
        db.commit_units(&scan.key, &scan.units)
            .with_context(|| format!("Failed to commit state for {}", scan.key))?;
    }
    Ok(())
}

/// Resolve a transform by name, treating `none` as an intentional no-op.
pub fn resolve_transform<'a>(
    registry: &'a weave_core::pipeline::TransformRegistry,
    name: &str,
) -> Result<Option<&'a dyn weave_core::pipeline::UnitTransform>> {
    if name == "none" {
        return Ok(None);
    }
    registry
        .get(name)
        .map(Some)
        .ok_or_else(|| anyhow!("Unknown transform `{}`; known: {}", name, registry.names().join(", ")))
}
