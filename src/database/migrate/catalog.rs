//! Migration catalog
//!
//! Turns a directory of `.sql` scripts into an ordered, versioned list. Script
//! files are named `<zero-padded version>_<description>.sql`, e.g.
//! `001_create_users_table.sql`. The catalog holds no state besides the
//! directory location; every call reads the filesystem afresh.
//!
//! Listing sorts by file name, which matches numeric order only because
//! authors zero-pad the prefix. The pending set is re-sorted by parsed version
//! so a badly padded name cannot reorder execution.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::error::{MigrateError, MigrateResult};

/// Extension of migration script files
pub const SCRIPT_EXTENSION: &str = "sql";

/// Largest version the `user_version` slot can hold
pub const MAX_VERSION: u32 = i32::MAX as u32;

/// A discovered migration script and its parsed version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    pub version: u32,
    pub path: PathBuf,
}

impl MigrationFile {
    /// File name without the directory, for display and logging
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Read the script body as UTF-8 text
    pub fn read_script(&self) -> MigrateResult<String> {
        fs::read_to_string(&self.path).map_err(|source| MigrateError::Catalog {
            path: self.path.clone(),
            source,
        })
    }
}

/// Read-only view over the migrations directory
#[derive(Debug, Clone)]
pub struct MigrationCatalog {
    dir: PathBuf,
}

impl MigrationCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory scanned by this catalog
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List every `.sql` file directly inside the directory, sorted by name
    ///
    /// A missing or unreadable directory is an error, never an empty list.
    pub fn list_scripts(&self) -> MigrateResult<Vec<PathBuf>> {
        let catalog_err = |source: std::io::Error| MigrateError::Catalog {
            path: self.dir.clone(),
            source,
        };

        let mut scripts = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(catalog_err)? {
            let entry = entry.map_err(catalog_err)?;
            let path = entry.path();
            let is_script = path
                .extension()
                .is_some_and(|ext| ext == SCRIPT_EXTENSION);
            if is_script && path.is_file() {
                scripts.push(path);
            }
        }

        scripts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!(
            "found {} migration scripts in {}",
            scripts.len(),
            self.dir.display()
        );
        Ok(scripts)
    }

    /// Every script in the directory, parsed and sorted by version
    pub fn migrations(&self) -> MigrateResult<Vec<MigrationFile>> {
        parse_all(self.list_scripts()?)
    }

    /// Scripts whose version is strictly greater than `current_version`
    pub fn pending(&self, current_version: u32) -> MigrateResult<Vec<MigrationFile>> {
        select_pending(self.list_scripts()?, current_version)
    }
}

/// Parse the version prefix of a migration script
///
/// The prefix is everything before the first `_` in the file name and must be
/// a plain base-10 number. `002_add_index.sql` gives 2; `abc.sql`,
/// `no_prefix.sql` and `_init.sql` are rejected.
pub fn parse_version(path: &Path) -> MigrateResult<u32> {
    let malformed = |reason: &str| MigrateError::MalformedVersion {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| malformed("file name is not valid UTF-8"))?;

    let prefix = name.split('_').next().unwrap_or_default();
    if prefix.is_empty() {
        return Err(malformed("empty version prefix"));
    }
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(&format!("version prefix '{prefix}' is not a number")));
    }

    let version: u32 = prefix
        .parse()
        .map_err(|_| malformed(&format!("version prefix '{prefix}' is out of range")))?;
    if version > MAX_VERSION {
        return Err(malformed(&format!(
            "version {version} exceeds the maximum of {MAX_VERSION}"
        )));
    }
    Ok(version)
}

/// Pair each script with its version, sort by version and reject duplicates
fn parse_all<I>(scripts: I) -> MigrateResult<Vec<MigrationFile>>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut migrations = scripts
        .into_iter()
        .map(|path| {
            let version = parse_version(&path)?;
            Ok(MigrationFile { version, path })
        })
        .collect::<MigrateResult<Vec<_>>>()?;

    migrations.sort_by_key(|m| m.version);

    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(MigrateError::DuplicateVersion {
            version: pair[0].version,
            first: pair[0].path.clone(),
            second: pair[1].path.clone(),
        });
    }

    Ok(migrations)
}

/// Filter a script listing down to the pending set, ordered by version
///
/// Every script is parsed, not only the pending ones, so a malformed or
/// duplicated file fails the whole run before anything executes.
pub fn select_pending<I>(scripts: I, current_version: u32) -> MigrateResult<Vec<MigrationFile>>
where
    I: IntoIterator<Item = PathBuf>,
{
    let migrations = parse_all(scripts)?;
    Ok(pending_from(&migrations, current_version))
}

/// Migrations above `current_version`, in ascending version order
pub fn pending_from(migrations: &[MigrationFile], current_version: u32) -> Vec<MigrationFile> {
    let mut pending: Vec<MigrationFile> = migrations
        .iter()
        .filter(|m| m.version > current_version)
        .cloned()
        .collect();
    pending.sort_by_key(|m| m.version);
    pending
}
