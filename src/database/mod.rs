//! Database module
//!
//! ```text
//! database/
//! ├── core/           # SQLite DatabaseConn wrapper and checkpoint accessor
//! └── migrate/        # Migration catalog and executor
//!     ├── catalog     # Script discovery and version parsing
//!     ├── executor    # Transactional application and status
//!     └── error       # MigrateError
//! ```
//!
//! The database is a single SQLite file. Its schema is owned entirely by the
//! numbered scripts in the migrations directory; nothing in this crate creates
//! tables on its own.

pub mod core;
pub mod migrate;

pub use core::DatabaseConn;

pub use migrate::{
    AppliedMigration, MigrateError, MigrateResult, MigrationCatalog, MigrationFile,
    MigrationReport, MigrationStatus, Migrator, SchemaState,
};
