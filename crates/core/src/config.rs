//! Project configuration and on-disk layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::instrument::MonitorSpec;
use crate::pipeline::Container;

/// One configured container mapping (declared input → declared output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerConfig {
    /// A packaged archive of compiled units.
    Jar { input: PathBuf, output: PathBuf },
    /// A loose directory of compiled units.
    Dir { input: PathBuf, output: PathBuf },
}

/// Serializable configuration for a classweave project.
///
/// This lives at `classweave.yaml` (or `.json`) in the project root. All
/// paths are interpreted relative to that root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaveConfig {
    /// Human-friendly project name.
    pub name: String,
    /// Monitor entry-point location injected by the instrumenter.
    #[serde(default)]
    pub monitor: MonitorSpec,
    /// Transform to run, by registry name.
    #[serde(default = "default_transform_name")]
    pub transform: String,
    /// Build-state database path, relative to the project root.
    #[serde(default = "default_state_db")]
    pub state_db: String,
    /// Declared containers.
    #[serde(default)]
    pub containers: Vec<ContainerConfig>,
}

fn default_transform_name() -> String {
    "entry-monitor".to_string()
}

fn default_state_db() -> String {
    ".classweave/state.db".to_string()
}

impl WeaveConfig {
    /// Create a configuration with defaults and no containers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            monitor: MonitorSpec::default(),
            transform: default_transform_name(),
            state_db: default_state_db(),
            containers: Vec::new(),
        }
    }

    /// Resolve configured containers against the project root.
    pub fn resolved_containers(&self, root: &Path) -> Vec<Container> {
        self.containers
            .iter()
            .map(|container| match container {
                ContainerConfig::Jar { input, output } => {
                    Container::Archive { input: root.join(input), output: root.join(output) }
                }
                ContainerConfig::Dir { input, output } => {
                    Container::Tree { input: root.join(input), output: root.join(output) }
                }
            })
            .collect()
    }
}

/// Logical layout of a project on disk, derived from a chosen root.
///
/// Does not perform any IO; frontends create directories and files based on
/// these paths.
#[derive(Debug, Clone)]
pub struct WeaveLayout {
    /// Root directory of the project.
    pub root: PathBuf,
    /// Directory for internal metadata (`.classweave`).
    pub meta_dir: PathBuf,
    /// Path to the project config file.
    pub config_path: PathBuf,
    /// Path to the build-state database file.
    pub state_db_path: PathBuf,
}

impl WeaveLayout {
    /// Compute the default layout for a project rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".classweave");
        let config_path = root.join("classweave.yaml");
        let state_db_path = meta_dir.join("state.db");
        Self { root, meta_dir, config_path, state_db_path }
    }

    /// State database path for a given configuration (may be relative or
    /// absolute in the config).
    pub fn state_db_for(&self, config: &WeaveConfig) -> PathBuf {
        let configured = Path::new(&config.state_db);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.root.join(configured)
        }
    }
}
