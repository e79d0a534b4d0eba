//! Error types for the migration runner.

use std::path::PathBuf;
use thiserror::Error;

/// Migration runner errors.
///
/// Every variant keeps the underlying driver or I/O error as its source so
/// callers see the original failure unchanged.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The database file could not be opened or configured.
    #[error("failed to open database at '{}': {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A script filename does not start with a usable version prefix.
    #[error("malformed migration version in '{}': {reason}", path.display())]
    MalformedVersion { path: PathBuf, reason: String },

    /// Two scripts carry the same version prefix.
    #[error(
        "duplicate migration version {version}: '{}' and '{}'",
        first.display(),
        second.display()
    )]
    DuplicateVersion {
        version: u32,
        first: PathBuf,
        second: PathBuf,
    },

    /// The migrations directory or a script file could not be read.
    #[error("failed to read migrations from '{}': {source}", path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A script failed to execute; its transaction was rolled back.
    #[error("migration {version} ('{}') failed: {source}", path.display())]
    Script {
        version: u32,
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A script ended the transaction it runs in; the checkpoint was not moved.
    #[error(
        "migration {version} ('{}') ended its transaction early; scripts must not contain BEGIN, COMMIT or ROLLBACK",
        path.display()
    )]
    TransactionControl { version: u32, path: PathBuf },

    /// Reading or writing the schema checkpoint failed.
    #[error("schema checkpoint error: {0}")]
    Checkpoint(#[source] rusqlite::Error),
}

/// Result type alias for [`MigrateError`].
pub type MigrateResult<T> = Result<T, MigrateError>;

impl MigrateError {
    /// Version of the migration this error is attached to, if any.
    pub fn version(&self) -> Option<u32> {
        match self {
            MigrateError::Script { version, .. } => Some(*version),
            MigrateError::DuplicateVersion { version, .. } => Some(*version),
            MigrateError::TransactionControl { version, .. } => Some(*version),
            _ => None,
        }
    }
}
