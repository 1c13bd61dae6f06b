use std::fs;

use anyhow::{Context, Result};

use weave_core::config::{WeaveConfig, WeaveLayout};
use weave_core::state::StateDb;

use crate::{canonicalize_or_current, infer_project_name};

/// Initialize a new classweave project at `root`.
pub fn init_command(root: &str, name: Option<String>) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = WeaveLayout::new(&root_path);

    let project_name = match name {
        Some(n) => n,
        None => infer_project_name(&root_path),
    };

    fs::create_dir_all(&layout.meta_dir)
        .with_context(|| format!("Failed to create meta dir: {}", layout.meta_dir.display()))?;

    let config = WeaveConfig::new(&project_name);
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize project config")?;
    fs::write(&layout.config_path, yaml)
        .with_context(|| format!("Failed to write project config: {}", layout.config_path.display()))?;

    // Create the state database immediately so follow-on commands (and
    // tests) can rely on its presence.
    StateDb::open(&layout.state_db_path).with_context(|| {
        format!("Failed to initialize state database at {}", layout.state_db_path.display())
    })?;

    println!("Initialized classweave project:");
    println!("  Name: {}", project_name);
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.config_path.display());
    println!("  State DB: {}", layout.state_db_path.display());
    println!();
    println!("Add container mappings to the config, e.g.:");
    println!("  containers:");
    println!("    - jar:");
    println!("        input: build/libs/app.jar");
    println!("        output: build/weave/app.jar");
    println!("    - dir:");
    println!("        input: build/classes");
    println!("        output: build/weave/classes");

    Ok(())
}
