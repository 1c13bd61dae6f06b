use anyhow::{Context, Result};

use weave_core::config::WeaveLayout;

use crate::{canonicalize_or_current, open_project_state};

/// List recorded pipeline runs.
pub fn runs_command(root: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = WeaveLayout::new(&root_path);
    let (_config, _db_path, db) = open_project_state(&layout)?;

    let runs = db.list_runs().context("Failed to list runs")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!("Runs ({}):", runs.len());
    if runs.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for run in runs {
        println!(
            "  - [{}] {} via {} ({:.3} ms) started {}",
            run.status, run.mode, run.transform, run.duration_ms, run.started_at
        );
    }

    Ok(())
}
