//! Wallet schema migrations.
//!
//! # Responsibility
//! - Create the template, instance and notification tables in dependency
//!   order: instances reference templates, ledger rows reference templates.
//! - Bring an older store up to the latest schema in one transaction.
//!
//! # Invariants
//! - Steps are listed by strictly increasing `version`.
//! - The highest applied step is mirrored to `PRAGMA user_version`.
//! - A store written by a newer binary is never touched.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "templates",
        sql: include_str!("0001_templates.sql"),
    },
    SchemaStep {
        version: 2,
        name: "instances",
        sql: include_str!("0002_instances.sql"),
    },
    SchemaStep {
        version: 3,
        name: "notifications",
        sql: include_str!("0003_notifications.sql"),
    },
];

/// Schema version written by this build.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Applies every step above the store's current version.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = stored_version(conn)?;
    let latest = latest_version();

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }
    if from_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > from_version) {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={latest}");
    Ok(())
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, SCHEMA_STEPS};
    use rusqlite::Connection;

    #[test]
    fn steps_are_strictly_increasing_and_named() {
        let versions: Vec<u32> = SCHEMA_STEPS.iter().map(|step| step.version).collect();
        assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(SCHEMA_STEPS.iter().all(|step| !step.name.is_empty()));
        assert_eq!(latest_version(), 3);
    }

    #[test]
    fn partial_store_is_upgraded_from_its_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(SCHEMA_STEPS[0].sql).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        apply_migrations(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, latest_version());
        let ledger: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'notifications';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(ledger, 1);
    }
}
