//! Archive (jar) container reconciliation.
//!
//! Entries stream in their original order. Directory markers are skipped,
//! qualifying units are transformed under the same entry name, and anything
//! else is dropped rather than copied. A whole archive carries one change
//! status: a zip cannot be patched entry-wise, so `Added`/`Changed` rebuild
//! the output archive and `Removed` deletes it.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ChangeStatus, PipelineError, PipelineResult, RunMode, UnitTransform};

/// Reconcile one input archive against its output location.
pub fn reconcile_archive(
    input: &Path,
    output: &Path,
    mode: RunMode,
    status: ChangeStatus,
    transform: Option<&dyn UnitTransform>,
) -> PipelineResult<()> {
    let Some(transform) = transform else {
        debug!(input = %input.display(), "no transform function; archive left untouched");
        return Ok(());
    };

    match mode {
        RunMode::Full => transform_archive(input, output, transform),
        RunMode::Incremental => match status {
            ChangeStatus::Unchanged => Ok(()),
            ChangeStatus::Added | ChangeStatus::Changed => {
                transform_archive(input, output, transform)
            }
            ChangeStatus::Removed => delete_if_exists(output),
        },
    }
}

/// Transform every qualifying entry of `input` into a fresh archive at
/// `output`, preserving entry order.
fn transform_archive(
    input: &Path,
    output: &Path,
    transform: &dyn UnitTransform,
) -> PipelineResult<()> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(input)?))?;

    // Validate every entry name before the first write: a hostile name must
    // not be able to place or truncate anything.
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if !entry.is_dir() {
            validate_entry_name(entry.name())?;
        }
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(BufWriter::new(File::create(output)?));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if !transform.qualifies(&name) {
            // Resources are dropped, not copied.
            continue;
        }
        writer.start_file(name.as_str(), options)?;
        transform.transform(&name, &mut entry, &mut writer)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    Ok(())
}

/// Reject entry names that could escape the output root: absolute paths,
/// parent traversals, backslash separators, and drive-like prefixes.
pub fn validate_entry_name(name: &str) -> PipelineResult<()> {
    let hostile = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.contains(':')
        || name.split('/').any(|component| component == "..");
    if hostile {
        return Err(PipelineError::UnsafeEntryName(name.to_string()));
    }
    Ok(())
}

/// Delete the output archive if present; a no-op when already absent.
fn delete_if_exists(output: &Path) -> PipelineResult<()> {
    match fs::remove_file(output) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
