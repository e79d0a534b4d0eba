#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Vaulture - local vault storage on a single SQLite file
//!
//! This crate holds Vaulture's storage bootstrap: locating the vault database,
//! preparing its directories, and bringing its schema up to date by applying
//! numbered SQL scripts in order.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Config, paths, database and migrations | `rusqlite`, `config` |
//! | `logging` | Rotating, redacting log bootstrap | `tracing-subscriber` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `vaulture` binary | All above + `clap` |
//!
//! ```toml
//! # Library only - embed the migration runner in another application
//! vaulture = { version = "0.3", default-features = false }
//!
//! # Library plus the logging bootstrap
//! vaulture = { version = "0.3", default-features = false, features = ["logging"] }
//! ```
//!
//! # Architecture
//!
//! - **[`config`]**: `VaultureConfig` from a TOML file and `VAULTURE_*` variables
//! - **[`paths`]**: database, migrations and log locations; private directory setup
//! - **[`database`]**: the SQLite connection wrapper and the migration runner
//!   - `migrate::MigrationCatalog`: discovers `NNN_description.sql` scripts
//!   - `migrate::Migrator`: applies pending scripts, one transaction each
//! - **[`logging`]**: global `tracing` subscriber (feature `logging`)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use vaulture::{AppPaths, Migrator, VaultureConfig};
//!
//! let config = VaultureConfig::new(&None)?;
//! let paths = AppPaths::from_config(&config)?;
//! paths.initialize()?;
//!
//! let report = Migrator::from_paths(&paths).run()?;
//! for applied in &report.applied {
//!     println!("applied {} ({})", applied.version, applied.file_name);
//! }
//! ```

pub mod config;
pub mod database;
pub mod output;
pub mod paths;

#[cfg(feature = "logging")]
pub mod logging;

pub use config::{DeploymentMode, VaultureConfig};
pub use paths::{ensure_private_dir, AppPaths, PathProvider, StaticPaths};

pub use database::{
    AppliedMigration, DatabaseConn, MigrateError, MigrateResult, MigrationCatalog, MigrationFile,
    MigrationReport, MigrationStatus, Migrator, SchemaState,
};

pub use output::OutputFormat;
