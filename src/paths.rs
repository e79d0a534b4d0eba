//! Location of Vaulture's on-disk resources
//!
//! The migration runner only needs two answers: where the database file is,
//! and which directory holds the migration scripts. [`PathProvider`] is that
//! seam; [`AppPaths`] answers it from a [`VaultureConfig`] and the deployment
//! mode:
//!
//! | Resource   | Packaged                               | Source checkout             |
//! |------------|----------------------------------------|-----------------------------|
//! | database   | `<user data dir>/Vaulture/vault.db`    | `<project>/data/vault.db`   |
//! | migrations | `<executable dir>/migrations`          | `<project>/migrations`      |
//! | log file   | `<user data dir>/Vaulture/vaulture.log`| `<project>/logs/vaulture.log` |
//!
//! Resolving paths has no side effects. Directories are created only by the
//! explicit [`AppPaths::initialize`] step, with owner-only permissions.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{DeploymentMode, VaultureConfig, APP_NAME};

/// Database file name
pub const DB_FILE_NAME: &str = "vault.db";

/// Log file name
pub const LOG_FILE_NAME: &str = "vaulture.log";

/// Name of the migrations directory in both layouts
pub const MIGRATIONS_DIR_NAME: &str = "migrations";

/// Permission bits for directories holding vault data
pub const PRIVATE_DIR_MODE: u32 = 0o700;

/// Supplies the two locations the migration runner depends on
pub trait PathProvider {
    /// Absolute path of the database file
    fn db_path(&self) -> PathBuf;

    /// Directory containing the ordered migration scripts
    fn migrations_path(&self) -> PathBuf;
}

/// Fixed locations, for embedding and tests
#[derive(Debug, Clone)]
pub struct StaticPaths {
    pub db: PathBuf,
    pub migrations: PathBuf,
}

impl StaticPaths {
    pub fn new(db: impl Into<PathBuf>, migrations: impl Into<PathBuf>) -> Self {
        Self {
            db: db.into(),
            migrations: migrations.into(),
        }
    }
}

impl PathProvider for StaticPaths {
    fn db_path(&self) -> PathBuf {
        self.db.clone()
    }

    fn migrations_path(&self) -> PathBuf {
        self.migrations.clone()
    }
}

/// Fully resolved application locations
#[derive(Debug, Clone, Serialize)]
pub struct AppPaths {
    pub mode: DeploymentMode,
    pub db_path: PathBuf,
    pub migrations_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Resolve every location from the configuration
    ///
    /// Explicit `db_path`, `migrations_dir` and `log_dir` settings win;
    /// `data_dir` replaces the default data directory for the database and,
    /// in packaged mode, the log file.
    pub fn from_config(config: &VaultureConfig) -> Result<Self> {
        let (default_data_dir, default_migrations, default_log_dir) = match config.mode {
            DeploymentMode::Packaged => {
                let data_dir = match &config.data_dir {
                    Some(dir) => dir.clone(),
                    None => dirs::data_dir()
                        .ok_or_else(|| anyhow!("Could not find user data directory"))?
                        .join(APP_NAME),
                };
                let exe = std::env::current_exe()
                    .map_err(|e| anyhow!("Could not locate current executable: {}", e))?;
                let exe_dir = exe
                    .parent()
                    .ok_or_else(|| anyhow!("Executable path has no parent directory"))?
                    .to_path_buf();
                let log_dir = data_dir.clone();
                (data_dir, exe_dir.join(MIGRATIONS_DIR_NAME), log_dir)
            }
            DeploymentMode::Source => {
                let root = project_root();
                let data_dir = config.data_dir.clone().unwrap_or_else(|| root.join("data"));
                (
                    data_dir,
                    root.join(MIGRATIONS_DIR_NAME),
                    root.join("logs"),
                )
            }
        };

        Ok(AppPaths {
            mode: config.mode,
            db_path: config
                .db_path
                .clone()
                .unwrap_or_else(|| default_data_dir.join(DB_FILE_NAME)),
            migrations_dir: config.migrations_dir.clone().unwrap_or(default_migrations),
            log_dir: config.log_dir.clone().unwrap_or(default_log_dir),
        })
    }

    /// Path of the main log file
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// Directory the database file lives in
    pub fn db_dir(&self) -> Option<&Path> {
        self.db_path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Create the database and log directories with owner-only permissions
    ///
    /// Safe to call on every startup: existing directories are left as they
    /// are. The migrations directory is never created or modified. Returns the
    /// directories this call created.
    pub fn initialize(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        let dirs = self.db_dir().into_iter().chain([self.log_dir.as_path()]);
        for dir in dirs {
            if ensure_private_dir(dir)? {
                created.push(dir.to_path_buf());
            }
        }
        Ok(created)
    }

    /// Display resolved locations
    pub fn summary(&self) -> String {
        [
            format!("Mode:               {}", self.mode),
            format!("Database Path:      {}", self.db_path.display()),
            format!("Migrations Dir:     {}", self.migrations_dir.display()),
            format!("Log File:           {}", self.log_file().display()),
        ]
        .join("\n")
    }
}

impl PathProvider for AppPaths {
    fn db_path(&self) -> PathBuf {
        self.db_path.clone()
    }

    fn migrations_path(&self) -> PathBuf {
        self.migrations_dir.clone()
    }
}

/// Root of the source checkout this crate was built from
pub fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Make sure `path` is a directory, creating it (and parents) with mode 0700
///
/// Returns `true` when the directory was created by this call. An existing
/// directory keeps its permissions; an existing non-directory is an error.
pub fn ensure_private_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    if path.exists() {
        return Err(anyhow!(
            "Path '{}' exists but is not a directory",
            path.display()
        ));
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(PRIVATE_DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|e| anyhow!("Failed to create directory '{}': {}", path.display(), e))?;

    debug!("created private directory {}", path.display());
    Ok(true)
}
