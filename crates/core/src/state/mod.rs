//! Build-state database: the change tracker behind incremental runs.
//!
//! This module wraps a SQLite database storing:
//! - Per-container unit content hashes from the previous successful run.
//! - Run bookkeeping records (mode, transform, status, duration).
//!
//! The pipeline core never touches this database; the CLI diffs a fresh scan
//! of the inputs against it to build the change sets a run consumes, and
//! commits the scan back after the run succeeds.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::pipeline::ChangeStatus;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Error type for build-state operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Filesystem failure while scanning inputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

impl From<walkdir::Error> for StateError {
    fn from(err: walkdir::Error) -> Self {
        let msg = err.to_string();
        match err.into_io_error() {
            Some(io) => StateError::Io(io),
            None => StateError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg)),
        }
    }
}

/// Convenience result type for build-state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Stored hash of one unit within a container.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnitState {
    /// Container key (the declared input path).
    pub container: String,
    /// Unit path relative to the container root; empty for whole-archive rows.
    pub path: String,
    /// SHA-256 content hash, hex encoded.
    pub hash: String,
}

/// Bookkeeping record for one pipeline run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunRecord {
    pub mode: String,
    pub transform: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: f64,
}

/// SQLite-backed build-state database.
#[derive(Debug)]
pub struct StateDb {
    conn: Connection,
}

impl StateDb {
    /// Open (or create) the database and ensure the schema exists.
    pub fn open(path: &Path) -> StateResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose the underlying connection for advanced callers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Stored unit hashes for one container (ordered by path).
    pub fn snapshot(&self, container: &str) -> StateResult<Vec<UnitState>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT container, path, hash
            FROM units
            WHERE container = ?1
            ORDER BY path
            "#,
        )?;
        let rows = stmt.query_map(params![container], |row| {
            Ok(UnitState { container: row.get(0)?, path: row.get(1)?, hash: row.get(2)? })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Diff a current scan against the stored snapshot.
    ///
    /// Returns `(path, status)` pairs for everything that moved; unchanged
    /// units are omitted (absence already means `Unchanged`).
    pub fn diff(
        &self,
        container: &str,
        current: &[(String, String)],
    ) -> StateResult<Vec<(String, ChangeStatus)>> {
        let stored = self.snapshot(container)?;

        let mut deltas = Vec::new();
        for (path, hash) in current {
            match stored.iter().find(|unit| &unit.path == path) {
                None => deltas.push((path.clone(), ChangeStatus::Added)),
                Some(unit) if &unit.hash != hash => {
                    deltas.push((path.clone(), ChangeStatus::Changed));
                }
                Some(_) => {}
            }
        }
        for unit in &stored {
            if !current.iter().any(|(path, _)| path == &unit.path) {
                deltas.push((unit.path.clone(), ChangeStatus::Removed));
            }
        }
        Ok(deltas)
    }

    /// Whole-archive status: the archive is tracked as a single unit with an
    /// empty relative path.
    pub fn archive_status(&self, container: &str, hash: Option<&str>) -> StateResult<ChangeStatus> {
        let stored = self.snapshot(container)?;
        let previous = stored.iter().find(|unit| unit.path.is_empty());
        Ok(match (previous, hash) {
            (None, None) => ChangeStatus::Unchanged,
            (None, Some(_)) => ChangeStatus::Added,
            (Some(_), None) => ChangeStatus::Removed,
            (Some(unit), Some(hash)) if unit.hash != hash => ChangeStatus::Changed,
            (Some(_), Some(_)) => ChangeStatus::Unchanged,
        })
    }

    /// Replace the stored snapshot for a container with a fresh scan.
    pub fn commit_units(
        &mut self,
        container: &str,
        current: &[(String, String)],
    ) -> StateResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM units WHERE container = ?1", params![container])?;
        for (path, hash) in current {
            tx.execute(
                r#"
                INSERT INTO units (container, path, hash)
                VALUES (?1, ?2, ?3)
                "#,
                params![container, path, hash],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert a run record and return its row id.
    pub fn record_run(&self, record: &RunRecord) -> StateResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO runs (mode, transform, status, started_at, finished_at, duration_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.mode,
                record.transform,
                record.status,
                record.started_at,
                record.finished_at,
                record.duration_ms
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List all run records (ordered by id).
    pub fn list_runs(&self) -> StateResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT mode, transform, status, started_at, finished_at, duration_ms
            FROM runs
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RunRecord {
                mode: row.get(0)?,
                transform: row.get(1)?,
                status: row.get(2)?,
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                duration_ms: row.get(5)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: units table
/// - 2: add runs table
fn apply_migrations(conn: &Connection) -> StateResult<()> {
    let current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS units (
                container TEXT NOT NULL,
                path      TEXT NOT NULL,
                hash      TEXT NOT NULL,
                PRIMARY KEY (container, path)
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS runs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                mode        TEXT NOT NULL,
                transform   TEXT NOT NULL,
                status      TEXT NOT NULL,
                started_at  TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                duration_ms REAL NOT NULL
            );

            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> StateResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}

/// Compute the SHA-256 hash of a file as a hex string.
pub fn sha256_file(path: &Path) -> StateResult<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Scan a tree container, producing `(relative path, hash)` pairs sorted by
/// path. Relative paths use the platform separator, matching what the
/// reconciler computes with `strip_prefix`.
pub fn scan_tree(root: &Path) -> StateResult<Vec<(String, String)>> {
    let mut units = Vec::new();
    if !root.exists() {
        return Ok(units);
    }
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        let hash = sha256_file(entry.path())?;
        units.push((relative, hash));
    }
    units.sort();
    Ok(units)
}
