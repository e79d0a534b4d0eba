//! Database connection management
//!
//! This module provides the connection wrapper the migration runner owns for
//! the duration of a run, plus the single accessor for the schema checkpoint.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use rusqlite::{Connection, Transaction};

use crate::database::migrate::{MigrateError, MigrateResult};

/// Core database connection wrapper
///
/// `DatabaseConn` wraps a SQLite connection that has foreign-key enforcement
/// switched on before any statement runs. The connection is closed when the
/// wrapper is dropped, on every exit path.
pub struct DatabaseConn {
    pub conn: Connection,
    path: Option<PathBuf>,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// The file is created if it does not exist yet; its parent directory must
    /// already be present.
    pub fn open(path: &Path) -> MigrateResult<Self> {
        let conn = Connection::open(path).map_err(|source| MigrateError::Connection {
            path: path.to_path_buf(),
            source,
        })?;

        let db = DatabaseConn {
            conn,
            path: Some(path.to_path_buf()),
        };
        db.configure()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> MigrateResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| MigrateError::Connection {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        let db = DatabaseConn { conn, path: None };
        db.configure()?;
        Ok(db)
    }

    /// Location of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn configure(&self) -> MigrateResult<()> {
        // Only affects statements executed while enabled, so it must come first.
        self.conn
            .execute_batch("PRAGMA foreign_keys=ON")
            .map_err(|source| MigrateError::Connection {
                path: self
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(":memory:")),
                source,
            })
    }

    /// Read the schema checkpoint stored in `PRAGMA user_version`
    ///
    /// A database that has never been migrated reports 0.
    pub fn schema_version(&self) -> MigrateResult<u32> {
        read_user_version(&self.conn)
    }

    /// Begin an unchecked transaction
    ///
    /// The transaction rolls back when dropped without `commit()`.
    pub fn transaction(&self) -> MigrateResult<Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .map_err(MigrateError::Checkpoint)
    }

    /// Write the schema checkpoint inside an open transaction
    ///
    /// The new value becomes visible only when `tx` commits.
    pub fn set_schema_version(tx: &Transaction<'_>, version: u32) -> MigrateResult<()> {
        tx.pragma_update(None, "user_version", version)
            .map_err(MigrateError::Checkpoint)
    }

    /// Whether foreign-key enforcement is active on this connection
    pub fn foreign_keys_enabled(&self) -> Result<bool> {
        let enabled: i64 = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to read foreign_keys pragma: {}", e))?;
        Ok(enabled == 1)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", table_name.replace('"', "\"\""));
        let count: u64 = self
            .conn
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get table count: {}", e))?;
        Ok(count)
    }
}

/// Read `user_version` from any connection
///
/// The slot is a signed 32-bit integer; a negative value written by some
/// other tool is reported as a checkpoint error rather than clamped.
pub(crate) fn read_user_version(conn: &Connection) -> MigrateResult<u32> {
    let raw: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(MigrateError::Checkpoint)?;
    u32::try_from(raw)
        .map_err(|_| MigrateError::Checkpoint(rusqlite::Error::IntegralValueOutOfRange(0, raw)))
}
