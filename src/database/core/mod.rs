//! Core database infrastructure
//!
//! - `DatabaseConn`: SQLite connection wrapper with foreign keys enabled and
//!   the schema checkpoint accessor

mod connection;

pub use connection::DatabaseConn;
pub(crate) use connection::read_user_version;
