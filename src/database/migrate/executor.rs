//! Migration executor
//!
//! Owns the database connection for a run, reads the checkpoint, and applies
//! each pending script in its own transaction together with the checkpoint
//! update. A failing script rolls back alone; scripts committed before it stay
//! committed, and re-running picks up where the failure happened.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{pending_from, MigrationCatalog, MigrationFile};
use super::error::{MigrateError, MigrateResult};
use crate::database::core::{read_user_version, DatabaseConn};
use crate::paths::PathProvider;

/// A migration that was committed during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct AppliedMigration {
    pub version: u32,
    pub file_name: String,
    pub duration_ms: u64,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Checkpoint read at the start of the run
    pub from_version: u32,
    /// Checkpoint after the last committed migration
    pub to_version: u32,
    pub applied: Vec<AppliedMigration>,
}

impl MigrationReport {
    /// True when the run had nothing to apply
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Relationship between the stored checkpoint and the known migrations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchemaState {
    /// No migrations exist and the database was never migrated
    Empty,

    /// Every known migration is applied
    UpToDate,

    /// Migrations above the checkpoint are waiting
    NeedsMigration { from: u32, to: u32 },

    /// The database was migrated by a newer build than this catalog
    Ahead {
        database_version: u32,
        latest_known: u32,
    },
}

/// Read-only snapshot of the migration state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub db_path: PathBuf,
    pub migrations_dir: PathBuf,
    pub current_version: u32,
    pub latest_version: u32,
    pub pending: Vec<MigrationFile>,
    #[serde(flatten)]
    pub state: SchemaState,
}

/// Applies pending migrations to a single database file
#[derive(Debug, Clone)]
pub struct Migrator {
    db_path: PathBuf,
    catalog: MigrationCatalog,
}

impl Migrator {
    pub fn new(db_path: impl Into<PathBuf>, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            catalog: MigrationCatalog::new(migrations_dir),
        }
    }

    /// Build a migrator from the database and migrations location providers
    pub fn from_paths<P: PathProvider + ?Sized>(paths: &P) -> Self {
        Self::new(paths.db_path(), paths.migrations_path())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    /// Open the database with foreign-key enforcement switched on
    pub fn connect(&self) -> MigrateResult<DatabaseConn> {
        debug!("connecting to {}", self.db_path.display());
        DatabaseConn::open(&self.db_path)
    }

    /// Read the persisted checkpoint, 0 for a database never migrated
    pub fn read_checkpoint(conn: &DatabaseConn) -> MigrateResult<u32> {
        conn.schema_version()
    }

    /// Execute one script and move the checkpoint to `target_version`
    ///
    /// Both happen inside a single transaction: if any statement fails,
    /// nothing from the script and no checkpoint change is persisted. The
    /// script must not manage transactions itself. `path` is only used to
    /// label the error.
    pub fn apply_script(
        conn: &DatabaseConn,
        script: &str,
        target_version: u32,
        path: &Path,
    ) -> MigrateResult<()> {
        let script_err = |source: rusqlite::Error| MigrateError::Script {
            version: target_version,
            path: path.to_path_buf(),
            source,
        };

        let tx = conn.transaction()?;
        tx.execute_batch(script).map_err(script_err)?;
        // a COMMIT or ROLLBACK inside the script closes the runner's transaction
        if conn.conn.is_autocommit() {
            return Err(MigrateError::TransactionControl {
                version: target_version,
                path: path.to_path_buf(),
            });
        }
        DatabaseConn::set_schema_version(&tx, target_version)?;
        // deferred constraint violations surface at commit time
        tx.commit().map_err(script_err)?;
        Ok(())
    }

    /// Read a migration file and apply it
    pub fn apply_one(
        conn: &DatabaseConn,
        migration: &MigrationFile,
    ) -> MigrateResult<AppliedMigration> {
        let script = migration.read_script()?;
        let start = Instant::now();
        Self::apply_script(conn, &script, migration.version, &migration.path)?;

        Ok(AppliedMigration {
            version: migration.version,
            file_name: migration.file_name(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Apply every pending migration on an already open connection
    pub fn migrate(&self, conn: &DatabaseConn) -> MigrateResult<MigrationReport> {
        let from_version = Self::read_checkpoint(conn)?;
        let known = self.catalog.migrations()?;
        let pending = pending_from(&known, from_version);

        if pending.is_empty() {
            match known.last() {
                Some(latest) if latest.version < from_version => warn!(
                    "database schema version {} is newer than the latest known migration {}",
                    from_version, latest.version
                ),
                _ => debug!("database schema is up to date at version {}", from_version),
            }
        } else {
            info!(
                "applying {} pending migrations from version {}",
                pending.len(),
                from_version
            );
        }

        let mut current_version = from_version;
        let mut applied = Vec::with_capacity(pending.len());
        for migration in &pending {
            let done = Self::apply_one(conn, migration)?;
            info!(
                "applied migration {} ({}) in {} ms",
                done.version, done.file_name, done.duration_ms
            );
            current_version = migration.version;
            applied.push(done);
        }

        Ok(MigrationReport {
            from_version,
            to_version: current_version,
            applied,
        })
    }

    /// Connect, apply every pending migration in ascending order, disconnect
    ///
    /// Running again right after a successful run applies nothing. Any error
    /// is returned as-is; migrations committed before it remain applied.
    pub fn run(&self) -> MigrateResult<MigrationReport> {
        let conn = self.connect()?;
        self.migrate(&conn)
    }

    /// Inspect the checkpoint and pending set without changing anything
    ///
    /// A database file that does not exist yet reports version 0 and is not
    /// created.
    pub fn status(&self) -> MigrateResult<MigrationStatus> {
        let current_version = if self.db_path.exists() {
            let conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .map_err(|source| MigrateError::Connection {
                    path: self.db_path.clone(),
                    source,
                })?;
            read_user_version(&conn)?
        } else {
            0
        };

        let known = self.catalog.migrations()?;
        let latest_version = known.last().map(|m| m.version).unwrap_or(0);
        let pending = pending_from(&known, current_version);

        let state = if known.is_empty() && current_version == 0 {
            SchemaState::Empty
        } else if current_version > latest_version {
            SchemaState::Ahead {
                database_version: current_version,
                latest_known: latest_version,
            }
        } else if pending.is_empty() {
            SchemaState::UpToDate
        } else {
            SchemaState::NeedsMigration {
                from: current_version,
                to: latest_version,
            }
        };

        Ok(MigrationStatus {
            db_path: self.db_path.clone(),
            migrations_dir: self.catalog.dir().to_path_buf(),
            current_version,
            latest_version,
            pending,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir(dir.path().join("migrations")).unwrap();
            Self { dir }
        }

        fn script(&self, name: &str, sql: &str) -> &Self {
            fs::write(self.dir.path().join("migrations").join(name), sql).unwrap();
            self
        }

        fn db_path(&self) -> PathBuf {
            self.dir.path().join("vault.db")
        }

        fn migrator(&self) -> Migrator {
            Migrator::new(self.db_path(), self.dir.path().join("migrations"))
        }

        fn open(&self) -> DatabaseConn {
            DatabaseConn::open(&self.db_path()).unwrap()
        }
    }

    #[test]
    fn test_apply_script_in_memory() {
        let conn = DatabaseConn::open_in_memory().unwrap();
        Migrator::apply_script(
            &conn,
            "CREATE TABLE foo(id INTEGER PRIMARY KEY);",
            1,
            Path::new("001_create_table.sql"),
        )
        .unwrap();

        assert!(conn.table_exists("foo").unwrap());
        assert_eq!(conn.schema_version().unwrap(), 1);
    }

    #[test]
    fn test_run_applies_all_migrations() {
        let fx = Fixture::new();
        fx.script("001_create.sql", "CREATE TABLE foo(id INTEGER PRIMARY KEY);")
            .script("002_insert.sql", "INSERT INTO foo(id) VALUES (42);");

        let report = fx.migrator().run().unwrap();
        assert_eq!(report.from_version, 0);
        assert_eq!(report.to_version, 2);
        assert_eq!(
            report
                .applied
                .iter()
                .map(|a| a.version)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );

        let conn = fx.open();
        assert_eq!(conn.schema_version().unwrap(), 2);
        assert!(conn.table_exists("foo").unwrap());
        assert_eq!(conn.table_count("foo").unwrap(), 1);
    }

    #[test]
    fn test_run_is_idempotent() {
        let fx = Fixture::new();
        fx.script("001_create.sql", "CREATE TABLE foo(id INTEGER PRIMARY KEY);")
            .script("002_insert.sql", "INSERT INTO foo(id) VALUES (1);");

        let migrator = fx.migrator();
        migrator.run().unwrap();
        let second = migrator.run().unwrap();

        assert!(second.is_noop());
        assert_eq!(second.from_version, 2);
        assert_eq!(second.to_version, 2);
        // a second insert would have raised a primary key conflict or added a row
        assert_eq!(fx.open().table_count("foo").unwrap(), 1);
    }

    #[test]
    fn test_run_rolls_back_failed_script() {
        let fx = Fixture::new();
        fx.script(
            "001_broken.sql",
            "CREATE TABLE partial(id INTEGER PRIMARY KEY);
             INSERT INTO partial(id) VALUES (1);
             CREATE TABLE broken(",
        );

        let err = fx.migrator().run().unwrap_err();
        assert!(matches!(err, MigrateError::Script { version: 1, .. }));

        let conn = fx.open();
        assert_eq!(conn.schema_version().unwrap(), 0);
        assert!(!conn.table_exists("partial").unwrap());
    }

    #[test]
    fn test_script_with_commit_does_not_advance_checkpoint() {
        let conn = DatabaseConn::open_in_memory().unwrap();
        let err = Migrator::apply_script(
            &conn,
            "CREATE TABLE a(id INTEGER); COMMIT; CREATE TABLE b(id INTEGER);",
            1,
            Path::new("001_self_committing.sql"),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MigrateError::TransactionControl { version: 1, .. }
        ));
        assert_eq!(conn.schema_version().unwrap(), 0);
        assert!(conn.conn.is_autocommit());
    }

    #[test]
    fn test_partial_progress_survives_later_failure() {
        let fx = Fixture::new();
        fx.script("001_create.sql", "CREATE TABLE foo(id INTEGER PRIMARY KEY);")
            .script("002_bad.sql", "INSERT INTO missing_table VALUES (1);");

        let err = fx.migrator().run().unwrap_err();
        assert_eq!(err.version(), Some(2));

        let conn = fx.open();
        assert_eq!(conn.schema_version().unwrap(), 1);
        assert!(conn.table_exists("foo").unwrap());
        drop(conn);

        // fixing the script and re-running resumes from the checkpoint
        fx.script("002_bad.sql", "INSERT INTO foo(id) VALUES (7);");
        let report = fx.migrator().run().unwrap();
        assert_eq!(report.from_version, 1);
        assert_eq!(report.to_version, 2);
        assert_eq!(fx.open().table_count("foo").unwrap(), 1);
    }

    #[test]
    fn test_foreign_keys_enforced_during_migration() {
        let fx = Fixture::new();
        fx.script(
            "001_schema.sql",
            "CREATE TABLE users(id INTEGER PRIMARY KEY);
             CREATE TABLE items(id INTEGER PRIMARY KEY,
                                user_id INTEGER NOT NULL REFERENCES users(id));",
        )
        .script("002_orphan.sql", "INSERT INTO items(id, user_id) VALUES (1, 99);");

        let err = fx.migrator().run().unwrap_err();
        assert!(matches!(err, MigrateError::Script { version: 2, .. }));
        assert_eq!(fx.open().schema_version().unwrap(), 1);
    }

    #[test]
    fn test_malformed_name_aborts_before_execution() {
        let fx = Fixture::new();
        fx.script("001_create.sql", "CREATE TABLE foo(id INTEGER PRIMARY KEY);")
            .script("latest.sql", "CREATE TABLE bar(id INTEGER PRIMARY KEY);");

        let err = fx.migrator().run().unwrap_err();
        assert!(matches!(err, MigrateError::MalformedVersion { .. }));

        let conn = fx.open();
        assert_eq!(conn.schema_version().unwrap(), 0);
        assert!(!conn.table_exists("foo").unwrap());
    }

    #[test]
    fn test_duplicate_versions_abort_before_execution() {
        let fx = Fixture::new();
        fx.script("001_a.sql", "CREATE TABLE a(id INTEGER);")
            .script("001_b.sql", "CREATE TABLE b(id INTEGER);");

        let err = fx.migrator().run().unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateVersion { version: 1, .. }));
        assert!(!fx.open().table_exists("a").unwrap());
    }

    #[test]
    fn test_sparse_versions_applied_in_numeric_order() {
        let fx = Fixture::new();
        fx.script("10_third.sql", "INSERT INTO log(step) VALUES ('third');")
            .script("2_second.sql", "INSERT INTO log(step) VALUES ('second');")
            .script("001_first.sql", "CREATE TABLE log(n INTEGER PRIMARY KEY, step TEXT);");

        let report = fx.migrator().run().unwrap();
        assert_eq!(report.to_version, 10);

        let conn = fx.open();
        let steps: Vec<String> = conn
            .conn
            .prepare("SELECT step FROM log ORDER BY n")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(steps, vec!["second", "third"]);
    }

    #[test]
    fn test_connection_error_for_unreachable_database() {
        let fx = Fixture::new();
        let migrator = Migrator::new(
            fx.dir.path().join("no-such-dir").join("vault.db"),
            fx.dir.path().join("migrations"),
        );
        assert!(matches!(
            migrator.run(),
            Err(MigrateError::Connection { .. })
        ));
    }

    #[test]
    fn test_status_reports_states() {
        let fx = Fixture::new();
        let migrator = fx.migrator();

        let status = migrator.status().unwrap();
        assert_eq!(status.state, SchemaState::Empty);
        assert!(!fx.db_path().exists());

        fx.script("001_create.sql", "CREATE TABLE foo(id INTEGER PRIMARY KEY);")
            .script("003_index.sql", "CREATE INDEX idx_foo ON foo(id);");
        let status = migrator.status().unwrap();
        assert_eq!(status.state, SchemaState::NeedsMigration { from: 0, to: 3 });
        assert_eq!(status.pending.len(), 2);

        migrator.run().unwrap();
        let status = migrator.status().unwrap();
        assert_eq!(status.state, SchemaState::UpToDate);
        assert_eq!(status.current_version, 3);
        assert!(status.pending.is_empty());

        let conn = fx.open();
        conn.conn.execute_batch("PRAGMA user_version = 5").unwrap();
        drop(conn);
        let status = migrator.status().unwrap();
        assert_eq!(
            status.state,
            SchemaState::Ahead {
                database_version: 5,
                latest_known: 3
            }
        );

        // a database ahead of the catalog is left alone
        let report = migrator.run().unwrap();
        assert!(report.is_noop());
        assert_eq!(report.to_version, 5);
    }

    #[test]
    fn test_status_serializes_flat_state() {
        let fx = Fixture::new();
        fx.script("001_create.sql", "CREATE TABLE foo(id INTEGER PRIMARY KEY);");

        let status = fx.migrator().status().unwrap();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "needs_migration");
        assert_eq!(json["from"], 0);
        assert_eq!(json["to"], 1);
        assert_eq!(json["pending"][0]["version"], 1);
    }

    #[test]
    fn test_bundled_migrations_apply_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = Migrator::new(
            dir.path().join("vault.db"),
            crate::paths::project_root().join("migrations"),
        );

        let report = migrator.run().unwrap();
        assert_eq!(report.from_version, 0);
        assert!(report.to_version >= 3);

        let conn = DatabaseConn::open(migrator.db_path()).unwrap();
        for table in ["users", "vault_entries", "tags", "entry_tags"] {
            assert!(conn.table_exists(table).unwrap(), "missing table {table}");
        }
        assert!(migrator.run().unwrap().is_noop());
    }
}
