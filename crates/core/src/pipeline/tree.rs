//! Tree (directory) container reconciliation.
//!
//! Output paths mirror the input's relative structure exactly. The mapping
//! is computed from the two roots and the file path alone, so it works for
//! `Removed` files that no longer exist on disk.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{ChangeSet, ChangeStatus, PipelineError, PipelineResult, RunMode, UnitTransform};

/// Map an input file to its output location under `output_root`.
pub fn output_path_for(
    input_root: &Path,
    output_root: &Path,
    input_file: &Path,
) -> PipelineResult<PathBuf> {
    let relative = input_file.strip_prefix(input_root).map_err(|_| PipelineError::OutsideRoot {
        file: input_file.to_path_buf(),
        root: input_root.to_path_buf(),
    })?;
    Ok(output_root.join(relative))
}

/// Reconcile one input directory against its output directory.
///
/// Full mode walks every file and transforms the qualifying ones;
/// non-qualifying files are skipped, never copied, and pre-existing output
/// files are not deleted here (the driver's full-mode clear already ran
/// once for the whole run). Incremental mode acts only on the recorded
/// change set.
pub fn reconcile_tree(
    input_root: &Path,
    output_root: &Path,
    mode: RunMode,
    changes: &ChangeSet,
    transform: Option<&dyn UnitTransform>,
) -> PipelineResult<()> {
    let Some(transform) = transform else {
        debug!(input = %input_root.display(), "no transform function; tree left untouched");
        return Ok(());
    };

    match mode {
        RunMode::Full => {
            for entry in WalkDir::new(input_root) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if !transform.qualifies(&name) {
                    continue;
                }
                let output = output_path_for(input_root, output_root, entry.path())?;
                transform_file(entry.path(), &output, transform)?;
            }
            Ok(())
        }
        RunMode::Incremental => {
            for (input_file, status) in changes.iter() {
                let output = output_path_for(input_root, output_root, input_file)?;
                match status {
                    ChangeStatus::Unchanged => {}
                    ChangeStatus::Added | ChangeStatus::Changed => {
                        let name = match input_file.file_name() {
                            Some(name) => name.to_string_lossy().into_owned(),
                            None => continue,
                        };
                        if input_file.is_dir() || !transform.qualifies(&name) {
                            continue;
                        }
                        transform_file(input_file, &output, transform)?;
                    }
                    ChangeStatus::Removed => delete_if_exists(&output)?,
                }
            }
            Ok(())
        }
    }
}

/// Transform a single file, creating parent directories as needed.
fn transform_file(
    input: &Path,
    output: &Path,
    transform: &dyn UnitTransform,
) -> PipelineResult<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let unit_name = input.to_string_lossy().into_owned();
    let mut reader = BufReader::new(File::open(input)?);
    let mut writer = BufWriter::new(File::create(output)?);
    transform.transform(&unit_name, &mut reader, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Delete the output file if present; idempotent when already absent.
fn delete_if_exists(output: &Path) -> PipelineResult<()> {
    match fs::remove_file(output) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
