use anyhow::Result;
use serde::Serialize;

use weave_core::config::WeaveLayout;
use weave_core::pipeline::ChangeStatus;

use crate::{canonicalize_or_current, open_project_state, scan_containers, ComputedChanges};

#[derive(Debug, Serialize)]
struct ContainerStatus {
    container: String,
    deltas: Vec<DeltaEntry>,
}

#[derive(Debug, Serialize)]
struct DeltaEntry {
    path: String,
    status: ChangeStatus,
}

/// Show the change set the next incremental run would act on.
pub fn status_command(root: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = WeaveLayout::new(&root_path);
    let (config, _db_path, db) = open_project_state(&layout)?;

    let containers = config.resolved_containers(&layout.root);
    let scans = scan_containers(&containers)?;
    let changes = ComputedChanges::compute(&db, &scans)?;

    let report: Vec<ContainerStatus> = containers
        .iter()
        .map(|container| ContainerStatus {
            container: container.input().to_string_lossy().into_owned(),
            deltas: changes
                .describe(container)
                .into_iter()
                .map(|(path, status)| DeltaEntry { path, status })
                .collect(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Pending changes ({} delta(s)):", changes.delta_count());
    for entry in report {
        println!("- {}:", entry.container);
        if entry.deltas.is_empty() {
            println!("    (unchanged)");
            continue;
        }
        for delta in entry.deltas {
            println!("    {:?} {}", delta.status, delta.path);
        }
    }

    Ok(())
}
