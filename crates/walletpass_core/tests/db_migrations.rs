use rusqlite::Connection;
use walletpass_core::db::migrations::latest_version;
use walletpass_core::db::{health_check, open_db, open_db_in_memory, DbError};

const WALLET_TABLES: &[&str] = &[
    "pass_templates",
    "template_generic",
    "template_event_ticket",
    "template_loyalty",
    "template_gift_card",
    "template_transit",
    "pass_instances",
    "instance_generic",
    "instance_event_ticket",
    "instance_loyalty",
    "instance_gift_card",
    "instance_transit",
    "instance_text_modules",
    "instance_messages",
    "notifications",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in WALLET_TABLES {
        assert_table_exists(&conn, table);
    }
    health_check(&conn).unwrap();
}

#[test]
fn health_check_rejects_unmigrated_connection() {
    let raw = Connection::open_in_memory().unwrap();
    assert!(matches!(
        health_check(&raw),
        Err(DbError::UnsupportedSchemaVersion { db_version: 0, .. })
    ));
}

#[test]
fn opened_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let orphan = conn.execute(
        "INSERT INTO pass_instances (object_id, class_id, holder_name, holder_email)
         VALUES ('OBJ1', 'MISSING', 'Jane', 'jane@example.com');",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walletpass.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "pass_templates");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn notification_rows_reject_updates() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO pass_templates (class_id, class_type) VALUES ('EVT1', 'event_ticket');
         INSERT INTO notifications (class_id, object_id, status, message)
         VALUES ('EVT1', 'OBJ1', 'sent', 'pushed');",
    )
    .unwrap();

    let updated = conn.execute("UPDATE notifications SET status = 'failed';", []);
    assert!(updated.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
