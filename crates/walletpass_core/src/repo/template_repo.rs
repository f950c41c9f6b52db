//! Template repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist a template as one `pass_templates` row plus exactly one
//!   type-specific child row.
//! - Reconstruct full templates in one logical read.
//!
//! # Invariants
//! - The child table always matches `pass_templates.class_type`.
//! - `class_type` never changes after creation.
//! - Deleting a template cascades to its child row, its instances and its
//!   ledger entries.

use super::{ensure_connection_ready, RepoError, RepoResult, Upserted};
use crate::model::template::{
    ClassId, ClassType, EventTicketDetails, GenericDetails, GiftCardDetails, LoyaltyDetails,
    PassTemplate, TemplateDetails, TemplatePatch, TransitDetails,
};
use crate::model::validation::ModelValidationError;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const TEMPLATE_SELECT_SQL: &str = "SELECT
    class_id,
    class_type,
    issuer_name,
    base_color,
    logo_url,
    hero_image_url
FROM pass_templates";

const TEMPLATE_TABLES: &[&str] = &[
    "pass_templates",
    "template_generic",
    "template_event_ticket",
    "template_loyalty",
    "template_gift_card",
    "template_transit",
];

/// Repository interface for template persistence.
pub trait TemplateRepository {
    /// Inserts parent and child rows; fails with `Conflict` on a taken id.
    fn create_template(&self, template: &PassTemplate) -> RepoResult<()>;
    fn get_template(&self, class_id: &str) -> RepoResult<Option<PassTemplate>>;
    /// Lists templates ordered by `class_id`, optionally of one type.
    fn list_templates(&self, class_type: Option<ClassType>) -> RepoResult<Vec<PassTemplate>>;
    /// Applies a partial update and returns the stored result.
    fn update_template(&self, class_id: &str, patch: &TemplatePatch) -> RepoResult<PassTemplate>;
    /// Creates or fully replaces by `class_id`. A type change is rejected.
    fn upsert_template(&self, template: &PassTemplate) -> RepoResult<Upserted>;
    fn delete_template(&self, class_id: &str) -> RepoResult<()>;
    fn template_exists(&self, class_id: &str) -> RepoResult<bool>;
}

/// SQLite-backed template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, TEMPLATE_TABLES)?;
        Ok(Self { conn })
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn create_template(&self, template: &PassTemplate) -> RepoResult<()> {
        template.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if template_class_type(&tx, &template.class_id)?.is_some() {
            return Err(RepoError::conflict("template", &template.class_id));
        }
        insert_parent(&tx, template)?;
        write_details(&tx, &template.class_id, &template.details)?;
        tx.commit()?;
        Ok(())
    }

    fn get_template(&self, class_id: &str) -> RepoResult<Option<PassTemplate>> {
        load_template(self.conn, class_id)
    }

    fn list_templates(&self, class_type: Option<ClassType>) -> RepoResult<Vec<PassTemplate>> {
        let mut sql = String::from(TEMPLATE_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(class_type) = class_type {
            sql.push_str(" WHERE class_type = ?");
            bind_values.push(Value::Text(class_type.as_str().to_string()));
        }
        sql.push_str(" ORDER BY class_id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut parents = Vec::new();
        while let Some(row) = rows.next()? {
            parents.push(parse_template_row(row)?);
        }

        parents
            .into_iter()
            .map(|parent| parent.hydrate(self.conn))
            .collect()
    }

    fn update_template(&self, class_id: &str, patch: &TemplatePatch) -> RepoResult<PassTemplate> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current =
            load_template(&tx, class_id)?.ok_or_else(|| RepoError::not_found("template", class_id))?;
        patch.validate_for(current.class_type())?;

        let next = patch.apply_to(&current);
        next.validate()?;
        update_parent(&tx, &next)?;
        write_details(&tx, &next.class_id, &next.details)?;
        tx.commit()?;
        Ok(next)
    }

    fn upsert_template(&self, template: &PassTemplate) -> RepoResult<Upserted> {
        template.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = match template_class_type(&tx, &template.class_id)? {
            Some(existing) if existing != template.class_type() => {
                return Err(ModelValidationError::ClassTypeChange {
                    from: existing,
                    to: template.class_type(),
                }
                .into());
            }
            Some(_) => {
                update_parent(&tx, template)?;
                Upserted::Updated
            }
            None => {
                insert_parent(&tx, template)?;
                Upserted::Created
            }
        };
        write_details(&tx, &template.class_id, &template.details)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn delete_template(&self, class_id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM pass_templates WHERE class_id = ?1;", [class_id])?;
        if changed == 0 {
            return Err(RepoError::not_found("template", class_id));
        }
        Ok(())
    }

    fn template_exists(&self, class_id: &str) -> RepoResult<bool> {
        Ok(template_class_type(self.conn, class_id)?.is_some())
    }
}

/// Stored class type of one template, if present.
pub(crate) fn template_class_type(conn: &Connection, class_id: &str) -> RepoResult<Option<ClassType>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT class_type FROM pass_templates WHERE class_id = ?1;",
            [class_id],
            |row| row.get(0),
        )
        .optional()?;
    value.as_deref().map(parse_class_type).transpose()
}

pub(crate) fn load_template(conn: &Connection, class_id: &str) -> RepoResult<Option<PassTemplate>> {
    let sql = format!("{TEMPLATE_SELECT_SQL} WHERE class_id = ?1;");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([class_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_template_row(row)?.hydrate(conn)?)),
        None => Ok(None),
    }
}

/// Parent row before its child record is attached.
struct TemplateRow {
    class_id: ClassId,
    class_type: ClassType,
    issuer_name: Option<String>,
    base_color: Option<String>,
    logo_url: Option<String>,
    hero_image_url: Option<String>,
}

impl TemplateRow {
    fn hydrate(self, conn: &Connection) -> RepoResult<PassTemplate> {
        let details = load_details(conn, &self.class_id, self.class_type)?;
        Ok(PassTemplate {
            class_id: self.class_id,
            issuer_name: self.issuer_name,
            base_color: self.base_color,
            logo_url: self.logo_url,
            hero_image_url: self.hero_image_url,
            details,
        })
    }
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<TemplateRow> {
    let class_type: String = row.get("class_type")?;
    Ok(TemplateRow {
        class_id: row.get("class_id")?,
        class_type: parse_class_type(&class_type)?,
        issuer_name: row.get("issuer_name")?,
        base_color: row.get("base_color")?,
        logo_url: row.get("logo_url")?,
        hero_image_url: row.get("hero_image_url")?,
    })
}

fn load_details(conn: &Connection, class_id: &str, class_type: ClassType) -> RepoResult<TemplateDetails> {
    let details = match class_type {
        ClassType::Generic => conn
            .query_row(
                "SELECT header_text, card_title FROM template_generic WHERE class_id = ?1;",
                [class_id],
                |row| {
                    Ok(TemplateDetails::Generic(GenericDetails {
                        header_text: row.get(0)?,
                        card_title: row.get(1)?,
                    }))
                },
            )
            .optional()?,
        ClassType::EventTicket => conn
            .query_row(
                "SELECT event_name, venue_name, venue_address, event_start
                 FROM template_event_ticket
                 WHERE class_id = ?1;",
                [class_id],
                |row| {
                    Ok(TemplateDetails::EventTicket(EventTicketDetails {
                        event_name: row.get(0)?,
                        venue_name: row.get(1)?,
                        venue_address: row.get(2)?,
                        event_start: row.get(3)?,
                    }))
                },
            )
            .optional()?,
        ClassType::Loyalty => conn
            .query_row(
                "SELECT program_name FROM template_loyalty WHERE class_id = ?1;",
                [class_id],
                |row| {
                    Ok(TemplateDetails::Loyalty(LoyaltyDetails {
                        program_name: row.get(0)?,
                    }))
                },
            )
            .optional()?,
        ClassType::GiftCard => conn
            .query_row(
                "SELECT merchant_name, card_number FROM template_gift_card WHERE class_id = ?1;",
                [class_id],
                |row| {
                    Ok(TemplateDetails::GiftCard(GiftCardDetails {
                        merchant_name: row.get(0)?,
                        card_number: row.get(1)?,
                    }))
                },
            )
            .optional()?,
        ClassType::Transit => conn
            .query_row(
                "SELECT transit_type, transit_operator_name
                 FROM template_transit
                 WHERE class_id = ?1;",
                [class_id],
                |row| {
                    Ok(TemplateDetails::Transit(TransitDetails {
                        transit_type: row.get(0)?,
                        transit_operator_name: row.get(1)?,
                    }))
                },
            )
            .optional()?,
    };

    details.ok_or_else(|| {
        RepoError::InvalidData(format!(
            "template `{class_id}` has no {class_type} detail row"
        ))
    })
}

fn insert_parent(conn: &Connection, template: &PassTemplate) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO pass_templates (
            class_id,
            class_type,
            issuer_name,
            base_color,
            logo_url,
            hero_image_url
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            template.class_id.as_str(),
            template.class_type().as_str(),
            template.issuer_name.as_deref(),
            template.base_color.as_deref(),
            template.logo_url.as_deref(),
            template.hero_image_url.as_deref(),
        ],
    )?;
    Ok(())
}

fn update_parent(conn: &Connection, template: &PassTemplate) -> RepoResult<()> {
    conn.execute(
        "UPDATE pass_templates
         SET issuer_name = ?2,
             base_color = ?3,
             logo_url = ?4,
             hero_image_url = ?5,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE class_id = ?1;",
        params![
            template.class_id.as_str(),
            template.issuer_name.as_deref(),
            template.base_color.as_deref(),
            template.logo_url.as_deref(),
            template.hero_image_url.as_deref(),
        ],
    )?;
    Ok(())
}

fn write_details(conn: &Connection, class_id: &str, details: &TemplateDetails) -> RepoResult<()> {
    match details {
        TemplateDetails::Generic(details) => conn.execute(
            "INSERT OR REPLACE INTO template_generic (class_id, header_text, card_title)
             VALUES (?1, ?2, ?3);",
            params![class_id, details.header_text.as_deref(), details.card_title.as_deref()],
        )?,
        TemplateDetails::EventTicket(details) => conn.execute(
            "INSERT OR REPLACE INTO template_event_ticket (
                class_id,
                event_name,
                venue_name,
                venue_address,
                event_start
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                class_id,
                details.event_name.as_str(),
                details.venue_name.as_deref(),
                details.venue_address.as_deref(),
                details.event_start.as_deref(),
            ],
        )?,
        TemplateDetails::Loyalty(details) => conn.execute(
            "INSERT OR REPLACE INTO template_loyalty (class_id, program_name) VALUES (?1, ?2);",
            params![class_id, details.program_name.as_str()],
        )?,
        TemplateDetails::GiftCard(details) => conn.execute(
            "INSERT OR REPLACE INTO template_gift_card (class_id, merchant_name, card_number)
             VALUES (?1, ?2, ?3);",
            params![
                class_id,
                details.merchant_name.as_str(),
                details.card_number.as_str(),
            ],
        )?,
        TemplateDetails::Transit(details) => conn.execute(
            "INSERT OR REPLACE INTO template_transit (class_id, transit_type, transit_operator_name)
             VALUES (?1, ?2, ?3);",
            params![
                class_id,
                details.transit_type.as_str(),
                details.transit_operator_name.as_deref(),
            ],
        )?,
    };
    Ok(())
}

fn parse_class_type(value: &str) -> RepoResult<ClassType> {
    ClassType::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid class type `{value}` in pass_templates.class_type"))
    })
}
