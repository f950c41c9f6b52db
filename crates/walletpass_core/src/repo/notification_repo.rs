//! Append-only propagation ledger.
//!
//! # Invariants
//! - Rows are never updated; a database trigger rejects `UPDATE`.
//! - Reads return rows in insertion order.
//! - Ledger rows are removed only by the owning template's cascade delete.

use super::{ensure_connection_ready, RepoError, RepoResult};
use crate::model::notification::{NewNotification, NotificationRecord, NotificationStatus};
use rusqlite::{params, Connection, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    class_id,
    object_id,
    status,
    message,
    created_at
FROM notifications";

/// Ledger of per-instance push outcomes.
pub trait NotificationLedger {
    fn append(&self, notification: &NewNotification) -> RepoResult<NotificationRecord>;
    fn list_for_template(&self, class_id: &str) -> RepoResult<Vec<NotificationRecord>>;
    fn list_for_instance(&self, object_id: &str) -> RepoResult<Vec<NotificationRecord>>;
}

pub struct SqliteNotificationLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationLedger<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["notifications"])?;
        Ok(Self { conn })
    }

    fn list_where(&self, column: &str, value: &str) -> RepoResult<Vec<NotificationRecord>> {
        let sql = format!("{NOTIFICATION_SELECT_SQL} WHERE {column} = ?1 ORDER BY id ASC;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([value])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_notification_row(row)?);
        }
        Ok(records)
    }
}

impl NotificationLedger for SqliteNotificationLedger<'_> {
    fn append(&self, notification: &NewNotification) -> RepoResult<NotificationRecord> {
        self.conn.execute(
            "INSERT INTO notifications (class_id, object_id, status, message)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                notification.class_id.as_str(),
                notification.object_id.as_str(),
                notification.status.as_str(),
                notification.message.as_str(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        let sql = format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_notification_row(row),
            None => Err(RepoError::InvalidData(format!(
                "notification {id} missing after insert"
            ))),
        }
    }

    fn list_for_template(&self, class_id: &str) -> RepoResult<Vec<NotificationRecord>> {
        self.list_where("class_id", class_id)
    }

    fn list_for_instance(&self, object_id: &str) -> RepoResult<Vec<NotificationRecord>> {
        self.list_where("object_id", object_id)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<NotificationRecord> {
    let status: String = row.get("status")?;
    Ok(NotificationRecord {
        id: row.get("id")?,
        class_id: row.get("class_id")?,
        object_id: row.get("object_id")?,
        status: NotificationStatus::parse(&status).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid status `{status}` in notifications.status"))
        })?,
        message: row.get("message")?,
        created_at: row.get("created_at")?,
    })
}
