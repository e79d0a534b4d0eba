//! Sequential schema migrations
//!
//! Versioned `.sql` scripts are discovered by the [`MigrationCatalog`] and
//! applied by the [`Migrator`]. The checkpoint lives in SQLite's
//! `PRAGMA user_version` slot, so no bookkeeping table has to exist before the
//! first migration runs.
//!
//! ```rust,ignore
//! use vaulture::database::migrate;
//! use vaulture::{AppPaths, VaultureConfig};
//!
//! let paths = AppPaths::from_config(&VaultureConfig::new(&None)?)?;
//! paths.initialize()?;
//! let report = migrate::run(&paths)?;
//! println!("schema at version {}", report.to_version);
//! ```

mod catalog;
mod error;
mod executor;

pub use catalog::{
    parse_version, pending_from, select_pending, MigrationCatalog, MigrationFile, MAX_VERSION,
    SCRIPT_EXTENSION,
};
pub use error::{MigrateError, MigrateResult};
pub use executor::{
    AppliedMigration, MigrationReport, MigrationStatus, Migrator, SchemaState,
};

use crate::paths::PathProvider;

/// Apply every pending migration to the database the provider points at
pub fn run<P: PathProvider + ?Sized>(paths: &P) -> MigrateResult<MigrationReport> {
    Migrator::from_paths(paths).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseConn;
    use crate::paths::StaticPaths;
    use std::fs;

    #[test]
    fn test_run_with_static_paths() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        fs::create_dir(&migrations).unwrap();
        fs::write(
            migrations.join("001_create_users.sql"),
            "CREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        )
        .unwrap();
        fs::write(
            migrations.join("002_seed_admin.sql"),
            "INSERT INTO users(name) VALUES ('admin');",
        )
        .unwrap();

        let paths = StaticPaths::new(dir.path().join("vault.db"), &migrations);
        let report = run(&paths).unwrap();
        assert_eq!(report.from_version, 0);
        assert_eq!(report.to_version, 2);
        assert_eq!(report.applied.len(), 2);

        let conn = DatabaseConn::open(&dir.path().join("vault.db")).unwrap();
        assert_eq!(conn.schema_version().unwrap(), 2);
        assert_eq!(conn.table_count("users").unwrap(), 1);

        assert!(run(&paths).unwrap().is_noop());
    }
}
