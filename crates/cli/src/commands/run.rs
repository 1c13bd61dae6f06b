use anyhow::{Context, Result};
use chrono::Utc;

use weave_core::config::WeaveLayout;
use weave_core::pipeline::{default_transform_registry, Pipeline, RunMode};
use weave_core::profile::rank_by_total;
use weave_core::state::RunRecord;

use crate::{
    canonicalize_or_current, commit_scans, open_project_state, resolve_transform, scan_containers,
    ComputedChanges,
};

/// Execute one pipeline run.
pub fn run_command(
    root: &str,
    full: bool,
    transform_override: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = WeaveLayout::new(&root_path);
    let (config, _db_path, mut db) = open_project_state(&layout)?;

    let containers = config.resolved_containers(&layout.root);
    if containers.is_empty() {
        println!("No containers configured; nothing to do.");
        return Ok(());
    }

    let scans = scan_containers(&containers)?;
    let changes = ComputedChanges::compute(&db, &scans)?;

    let mode = if full { RunMode::Full } else { RunMode::Incremental };
    let transform_name =
        transform_override.unwrap_or_else(|| config.transform.clone());

    if dry_run {
        print_deltas(&containers, &changes);
        println!(
            "Dry run: {} delta(s) would be applied with transform `{}`.",
            changes.delta_count(),
            transform_name
        );
        return Ok(());
    }

    let registry = default_transform_registry(config.monitor.clone());
    let transform = resolve_transform(&registry, &transform_name)?;

    let started_at = Utc::now().to_rfc3339();
    let pipeline =
        Pipeline { mode, containers: &containers, tracker: &changes, transform };
    let report = pipeline.run("transform").context("Pipeline run failed")?;
    let finished_at = Utc::now().to_rfc3339();

    commit_scans(&mut db, &scans)?;
    db.record_run(&RunRecord {
        mode: match mode {
            RunMode::Full => "full".to_string(),
            RunMode::Incremental => "incremental".to_string(),
        },
        transform: transform_name.clone(),
        status: "ok".to_string(),
        started_at,
        finished_at,
        duration_ms: report.phase.total_ms,
    })
    .context("Failed to record run")?;

    println!("Transform run:");
    println!("  Mode: {}", if full { "full" } else { "incremental" });
    println!("  Transform: {}", transform_name);
    println!("  Containers: {}", containers.len());
    println!("  Deltas: {}", changes.delta_count());
    println!("  Duration: {:.3} ms", report.phase.total_ms);

    let mut container_costs = report.containers;
    rank_by_total(&mut container_costs);
    for timing in &container_costs {
        println!("    {:.3} ms  {}", timing.total_ms, timing.name);
    }

    Ok(())
}

fn print_deltas(
    containers: &[weave_core::pipeline::Container],
    changes: &ComputedChanges,
) {
    for container in containers {
        let deltas = changes.describe(container);
        println!("- {}:", container.input().display());
        if deltas.is_empty() {
            println!("    (unchanged)");
            continue;
        }
        for (path, status) in deltas {
            println!("    {:?} {}", status, path);
        }
    }
}
