//! Wallet store bootstrap.
//!
//! # Responsibility
//! - Hand out connections whose schema holds templates, instances and the
//!   notification ledger at the latest version.
//! - Report store faults as `DbError` for repositories to wrap.
//!
//! # Invariants
//! - Foreign keys are on, so deleting a template removes its instances,
//!   their child rows and its ledger rows.
//! - Repositories only see connections that finished migrating.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} does not match supported version {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Confirms the connection answers queries and carries the current wallet schema.
pub fn health_check(conn: &Connection) -> DbResult<()> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest = migrations::latest_version();
    if version != latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: version,
            latest_supported: latest,
        });
    }
    conn.query_row("SELECT COUNT(*) FROM pass_templates;", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(())
}
