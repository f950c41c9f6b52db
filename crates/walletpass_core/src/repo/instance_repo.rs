//! Instance repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist an instance as a core row, one type child row and two ordered
//!   collections.
//! - Provide filtered listing and sync bookkeeping writes.
//!
//! # Invariants
//! - An instance's details type equals its template's `class_type`.
//! - Writing a collection deletes every existing row for the instance and
//!   re-inserts the supplied list with fresh ordinals; an empty list clears it.
//! - Listing order is insertion order.

use super::template_repo::template_class_type;
use super::{ensure_connection_ready, RepoError, RepoResult, Upserted};
use crate::model::instance::{
    EventTicketInstanceDetails, GenericInstanceDetails, GiftCardInstanceDetails, InstanceDetails,
    InstancePatch, InstanceStatus, LoyaltyInstanceDetails, ObjectId, PassInstance, PassMessage,
    SyncStatus, TextModule, TransitInstanceDetails,
};
use crate::model::template::{ClassId, ClassType};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const INSTANCE_SELECT_SQL: &str = "SELECT
    i.object_id,
    i.class_id,
    t.class_type,
    i.holder_name,
    i.holder_email,
    i.status,
    i.sync_status,
    i.last_synced_at
FROM pass_instances i
INNER JOIN pass_templates t ON t.class_id = i.class_id";

const INSTANCE_TABLES: &[&str] = &[
    "pass_instances",
    "instance_generic",
    "instance_event_ticket",
    "instance_loyalty",
    "instance_gift_card",
    "instance_transit",
    "instance_text_modules",
    "instance_messages",
];

/// Filters for listing instances. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceListQuery {
    pub class_id: Option<ClassId>,
    pub holder_email: Option<String>,
    pub status: Option<InstanceStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl InstanceListQuery {
    pub fn for_template(class_id: impl Into<ClassId>) -> Self {
        Self {
            class_id: Some(class_id.into()),
            ..Self::default()
        }
    }

    pub fn for_holder(holder_email: impl Into<String>) -> Self {
        Self {
            holder_email: Some(holder_email.into()),
            ..Self::default()
        }
    }
}

/// Repository interface for instance persistence.
pub trait InstanceRepository {
    /// Fails with `NotFound` when the template is missing and `Conflict`
    /// when the object id is taken.
    fn create_instance(&self, instance: &PassInstance) -> RepoResult<()>;
    fn get_instance(&self, object_id: &str) -> RepoResult<Option<PassInstance>>;
    fn list_instances(&self, query: &InstanceListQuery) -> RepoResult<Vec<PassInstance>>;
    /// Applies a partial update and returns the stored result.
    fn update_instance(&self, object_id: &str, patch: &InstancePatch) -> RepoResult<PassInstance>;
    fn update_status(&self, object_id: &str, status: InstanceStatus) -> RepoResult<()>;
    /// Records a successful push at the current time.
    fn mark_synced(&self, object_id: &str) -> RepoResult<()>;
    fn mark_sync_failed(&self, object_id: &str) -> RepoResult<()>;
    /// Creates or fully replaces by `object_id`, collections included.
    /// An empty holder email is accepted here for passes issued without one.
    fn upsert_instance(&self, instance: &PassInstance) -> RepoResult<Upserted>;
    fn delete_instance(&self, object_id: &str) -> RepoResult<()>;
}

/// SQLite-backed instance repository.
pub struct SqliteInstanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInstanceRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, INSTANCE_TABLES)?;
        Ok(Self { conn })
    }
}

impl InstanceRepository for SqliteInstanceRepository<'_> {
    fn create_instance(&self, instance: &PassInstance) -> RepoResult<()> {
        instance.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_template_type(&tx, instance)?;
        if instance_exists(&tx, &instance.object_id)? {
            return Err(RepoError::conflict("instance", &instance.object_id));
        }
        insert_core(&tx, instance)?;
        write_details(&tx, &instance.object_id, &instance.details)?;
        replace_text_modules(&tx, &instance.object_id, &instance.text_modules)?;
        replace_messages(&tx, &instance.object_id, &instance.messages)?;
        tx.commit()?;
        Ok(())
    }

    fn get_instance(&self, object_id: &str) -> RepoResult<Option<PassInstance>> {
        load_instance(self.conn, object_id)
    }

    fn list_instances(&self, query: &InstanceListQuery) -> RepoResult<Vec<PassInstance>> {
        let mut sql = String::from(INSTANCE_SELECT_SQL);
        let mut clauses: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(class_id) = query.class_id.as_ref() {
            clauses.push("i.class_id = ?");
            bind_values.push(Value::Text(class_id.clone()));
        }
        if let Some(holder_email) = query.holder_email.as_ref() {
            clauses.push("i.holder_email = ? COLLATE NOCASE");
            bind_values.push(Value::Text(holder_email.clone()));
        }
        if let Some(status) = query.status {
            clauses.push("i.status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(" ORDER BY i.created_at ASC, i.rowid ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut cores = Vec::new();
        while let Some(row) = rows.next()? {
            cores.push(parse_instance_row(row)?);
        }

        cores
            .into_iter()
            .map(|core| core.hydrate(self.conn))
            .collect()
    }

    fn update_instance(&self, object_id: &str, patch: &InstancePatch) -> RepoResult<PassInstance> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = load_instance(&tx, object_id)?
            .ok_or_else(|| RepoError::not_found("instance", object_id))?;
        patch.validate_for(current.class_type())?;

        let next = patch.apply_to(&current);
        next.validate_reconciled()?;
        update_core(&tx, &next)?;
        if patch.details.is_some() {
            write_details(&tx, object_id, &next.details)?;
        }
        if let Some(text_modules) = patch.text_modules.as_ref() {
            replace_text_modules(&tx, object_id, text_modules)?;
        }
        if let Some(messages) = patch.messages.as_ref() {
            replace_messages(&tx, object_id, messages)?;
        }
        tx.commit()?;
        Ok(next)
    }

    fn update_status(&self, object_id: &str, status: InstanceStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE pass_instances
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE object_id = ?1;",
            params![object_id, status.as_str()],
        )?;
        ensure_changed(changed, object_id)
    }

    fn mark_synced(&self, object_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE pass_instances
             SET sync_status = 'synced',
                 last_synced_at = (strftime('%s', 'now') * 1000)
             WHERE object_id = ?1;",
            [object_id],
        )?;
        ensure_changed(changed, object_id)
    }

    fn mark_sync_failed(&self, object_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE pass_instances
             SET sync_status = 'failed'
             WHERE object_id = ?1;",
            [object_id],
        )?;
        ensure_changed(changed, object_id)
    }

    fn upsert_instance(&self, instance: &PassInstance) -> RepoResult<Upserted> {
        instance.validate_reconciled()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_template_type(&tx, instance)?;
        let outcome = if instance_exists(&tx, &instance.object_id)? {
            update_core(&tx, instance)?;
            Upserted::Updated
        } else {
            insert_core(&tx, instance)?;
            Upserted::Created
        };
        write_details(&tx, &instance.object_id, &instance.details)?;
        replace_text_modules(&tx, &instance.object_id, &instance.text_modules)?;
        replace_messages(&tx, &instance.object_id, &instance.messages)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn delete_instance(&self, object_id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM pass_instances WHERE object_id = ?1;", [object_id])?;
        ensure_changed(changed, object_id)
    }
}

fn ensure_changed(changed: usize, object_id: &str) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::not_found("instance", object_id));
    }
    Ok(())
}

fn ensure_template_type(conn: &Connection, instance: &PassInstance) -> RepoResult<()> {
    let class_type = template_class_type(conn, &instance.class_id)?
        .ok_or_else(|| RepoError::not_found("template", &instance.class_id))?;
    instance.details.ensure_matches(class_type)?;
    Ok(())
}

fn instance_exists(conn: &Connection, object_id: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pass_instances WHERE object_id = ?1);",
        [object_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_instance(conn: &Connection, object_id: &str) -> RepoResult<Option<PassInstance>> {
    let sql = format!("{INSTANCE_SELECT_SQL} WHERE i.object_id = ?1;");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([object_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_instance_row(row)?.hydrate(conn)?)),
        None => Ok(None),
    }
}

/// Core row joined with its template's type, before children are attached.
struct InstanceRow {
    object_id: ObjectId,
    class_id: ClassId,
    class_type: ClassType,
    holder_name: String,
    holder_email: String,
    status: InstanceStatus,
    sync_status: SyncStatus,
    last_synced_at: Option<i64>,
}

impl InstanceRow {
    fn hydrate(self, conn: &Connection) -> RepoResult<PassInstance> {
        let details = load_details(conn, &self.object_id, self.class_type)?;
        let text_modules = load_text_modules(conn, &self.object_id)?;
        let messages = load_messages(conn, &self.object_id)?;
        Ok(PassInstance {
            object_id: self.object_id,
            class_id: self.class_id,
            holder_name: self.holder_name,
            holder_email: self.holder_email,
            status: self.status,
            sync_status: self.sync_status,
            last_synced_at: self.last_synced_at,
            details,
            text_modules,
            messages,
        })
    }
}

fn parse_instance_row(row: &Row<'_>) -> RepoResult<InstanceRow> {
    let class_type: String = row.get("class_type")?;
    let status: String = row.get("status")?;
    let sync_status: String = row.get("sync_status")?;
    Ok(InstanceRow {
        object_id: row.get("object_id")?,
        class_id: row.get("class_id")?,
        class_type: ClassType::parse(&class_type).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid class type `{class_type}` in pass_templates"))
        })?,
        holder_name: row.get("holder_name")?,
        holder_email: row.get("holder_email")?,
        status: InstanceStatus::parse(&status).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid status `{status}` in pass_instances.status"))
        })?,
        sync_status: SyncStatus::parse(&sync_status).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid sync status `{sync_status}` in pass_instances.sync_status"
            ))
        })?,
        last_synced_at: row.get("last_synced_at")?,
    })
}

/// A missing child row hydrates as an all-empty record of the template's type.
fn load_details(conn: &Connection, object_id: &str, class_type: ClassType) -> RepoResult<InstanceDetails> {
    let details = match class_type {
        ClassType::Generic => conn
            .query_row(
                "SELECT header_value, subheader_value FROM instance_generic WHERE object_id = ?1;",
                [object_id],
                |row| {
                    Ok(InstanceDetails::Generic(GenericInstanceDetails {
                        header_value: row.get(0)?,
                        subheader_value: row.get(1)?,
                    }))
                },
            )
            .optional()?,
        ClassType::EventTicket => conn
            .query_row(
                "SELECT confirmation_code, seat_number, section, row_label, gate
                 FROM instance_event_ticket
                 WHERE object_id = ?1;",
                [object_id],
                |row| {
                    Ok(InstanceDetails::EventTicket(EventTicketInstanceDetails {
                        confirmation_code: row.get(0)?,
                        seat_number: row.get(1)?,
                        section: row.get(2)?,
                        row_label: row.get(3)?,
                        gate: row.get(4)?,
                    }))
                },
            )
            .optional()?,
        ClassType::Loyalty => conn
            .query_row(
                "SELECT member_id, points, tier FROM instance_loyalty WHERE object_id = ?1;",
                [object_id],
                |row| {
                    Ok(InstanceDetails::Loyalty(LoyaltyInstanceDetails {
                        member_id: row.get(0)?,
                        points: row.get(1)?,
                        tier: row.get(2)?,
                    }))
                },
            )
            .optional()?,
        ClassType::GiftCard => conn
            .query_row(
                "SELECT card_number, balance, expiry_date FROM instance_gift_card WHERE object_id = ?1;",
                [object_id],
                |row| {
                    Ok(InstanceDetails::GiftCard(GiftCardInstanceDetails {
                        card_number: row.get(0)?,
                        balance: row.get(1)?,
                        expiry_date: row.get(2)?,
                    }))
                },
            )
            .optional()?,
        ClassType::Transit => conn
            .query_row(
                "SELECT ticket_number, zone, valid_from, valid_until
                 FROM instance_transit
                 WHERE object_id = ?1;",
                [object_id],
                |row| {
                    Ok(InstanceDetails::Transit(TransitInstanceDetails {
                        ticket_number: row.get(0)?,
                        zone: row.get(1)?,
                        valid_from: row.get(2)?,
                        valid_until: row.get(3)?,
                    }))
                },
            )
            .optional()?,
    };
    Ok(details.unwrap_or_else(|| InstanceDetails::empty(class_type)))
}

fn load_text_modules(conn: &Connection, object_id: &str) -> RepoResult<Vec<TextModule>> {
    let mut stmt = conn.prepare(
        "SELECT module_id, header, body
         FROM instance_text_modules
         WHERE object_id = ?1
         ORDER BY ordinal ASC, id ASC;",
    )?;
    let modules = stmt
        .query_map([object_id], |row| {
            Ok(TextModule {
                id: row.get(0)?,
                header: row.get(1)?,
                body: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(modules)
}

fn load_messages(conn: &Connection, object_id: &str) -> RepoResult<Vec<PassMessage>> {
    let mut stmt = conn.prepare(
        "SELECT message_id, header, body, message_type, display_start, display_end
         FROM instance_messages
         WHERE object_id = ?1
         ORDER BY ordinal ASC, id ASC;",
    )?;
    let messages = stmt
        .query_map([object_id], |row| {
            Ok(PassMessage {
                id: row.get(0)?,
                header: row.get(1)?,
                body: row.get(2)?,
                message_type: row.get(3)?,
                display_start: row.get(4)?,
                display_end: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

fn insert_core(conn: &Connection, instance: &PassInstance) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO pass_instances (
            object_id,
            class_id,
            holder_name,
            holder_email,
            status,
            sync_status,
            last_synced_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            instance.object_id.as_str(),
            instance.class_id.as_str(),
            instance.holder_name.as_str(),
            instance.holder_email.as_str(),
            instance.status.as_str(),
            instance.sync_status.as_str(),
            instance.last_synced_at,
        ],
    )?;
    Ok(())
}

fn update_core(conn: &Connection, instance: &PassInstance) -> RepoResult<()> {
    conn.execute(
        "UPDATE pass_instances
         SET class_id = ?2,
             holder_name = ?3,
             holder_email = ?4,
             status = ?5,
             sync_status = ?6,
             last_synced_at = ?7,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE object_id = ?1;",
        params![
            instance.object_id.as_str(),
            instance.class_id.as_str(),
            instance.holder_name.as_str(),
            instance.holder_email.as_str(),
            instance.status.as_str(),
            instance.sync_status.as_str(),
            instance.last_synced_at,
        ],
    )?;
    Ok(())
}

/// Replaces the type child. Rows of other types are removed first so a
/// re-parented instance never keeps a stale child.
fn write_details(conn: &Connection, object_id: &str, details: &InstanceDetails) -> RepoResult<()> {
    for table in [
        "instance_generic",
        "instance_event_ticket",
        "instance_loyalty",
        "instance_gift_card",
        "instance_transit",
    ] {
        conn.execute(&format!("DELETE FROM {table} WHERE object_id = ?1;"), [object_id])?;
    }

    match details {
        InstanceDetails::Generic(details) => conn.execute(
            "INSERT INTO instance_generic (object_id, header_value, subheader_value)
             VALUES (?1, ?2, ?3);",
            params![
                object_id,
                details.header_value.as_deref(),
                details.subheader_value.as_deref(),
            ],
        )?,
        InstanceDetails::EventTicket(details) => conn.execute(
            "INSERT INTO instance_event_ticket (
                object_id,
                confirmation_code,
                seat_number,
                section,
                row_label,
                gate
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                object_id,
                details.confirmation_code.as_deref(),
                details.seat_number.as_deref(),
                details.section.as_deref(),
                details.row_label.as_deref(),
                details.gate.as_deref(),
            ],
        )?,
        InstanceDetails::Loyalty(details) => conn.execute(
            "INSERT INTO instance_loyalty (object_id, member_id, points, tier)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                object_id,
                details.member_id.as_deref(),
                details.points,
                details.tier.as_deref(),
            ],
        )?,
        InstanceDetails::GiftCard(details) => conn.execute(
            "INSERT INTO instance_gift_card (object_id, card_number, balance, expiry_date)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                object_id,
                details.card_number.as_deref(),
                details.balance.as_deref(),
                details.expiry_date.as_deref(),
            ],
        )?,
        InstanceDetails::Transit(details) => conn.execute(
            "INSERT INTO instance_transit (object_id, ticket_number, zone, valid_from, valid_until)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                object_id,
                details.ticket_number.as_deref(),
                details.zone.as_deref(),
                details.valid_from.as_deref(),
                details.valid_until.as_deref(),
            ],
        )?,
    };
    Ok(())
}

fn replace_text_modules(conn: &Connection, object_id: &str, modules: &[TextModule]) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM instance_text_modules WHERE object_id = ?1;",
        [object_id],
    )?;
    for (ordinal, module) in modules.iter().enumerate() {
        conn.execute(
            "INSERT INTO instance_text_modules (object_id, module_id, header, body, ordinal)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                object_id,
                module.id.as_str(),
                module.header.as_deref(),
                module.body.as_deref(),
                ordinal as i64,
            ],
        )?;
    }
    Ok(())
}

fn replace_messages(conn: &Connection, object_id: &str, messages: &[PassMessage]) -> RepoResult<()> {
    conn.execute("DELETE FROM instance_messages WHERE object_id = ?1;", [object_id])?;
    for (ordinal, message) in messages.iter().enumerate() {
        conn.execute(
            "INSERT INTO instance_messages (
                object_id,
                message_id,
                header,
                body,
                message_type,
                display_start,
                display_end,
                ordinal
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                object_id,
                message.id.as_str(),
                message.header.as_deref(),
                message.body.as_deref(),
                message.message_type.as_deref(),
                message.display_start.as_deref(),
                message.display_end.as_deref(),
                ordinal as i64,
            ],
        )?;
    }
    Ok(())
}
