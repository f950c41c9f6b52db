//! Issued pass (instance) model.
//!
//! # Responsibility
//! - Define the holder-facing core record and its type-specific scalars.
//! - Define the two ordered, replace-all child collections.
//! - Define the explicit partial-update shape for instance edits.
//!
//! # Invariants
//! - Collection order is the `Vec` order; the store persists it as `ordinal`.
//! - `details.class_type()` must equal the owning template's class type.

use crate::model::template::{ClassId, ClassType};
use crate::model::validation::{check_email, check_id, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local instance business key.
pub type ObjectId = String;

/// Holder-visible pass life-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Expired,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "active" | "Active" => Some(Self::Active),
            "expired" | "Expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Maps the provider life-cycle `state` onto local status.
    ///
    /// Only `ACTIVE` stays active; every other provider state (`EXPIRED`,
    /// `INACTIVE`, `COMPLETED`, unknown) is treated as expired.
    pub fn from_remote_state(state: Option<&str>) -> Self {
        match state.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("active") => Self::Active,
            None => Self::Active,
            Some(_) => Self::Expired,
        }
    }

    pub fn remote_state(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
        }
    }
}

/// Last known push outcome against the remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericInstanceDetails {
    pub header_value: Option<String>,
    pub subheader_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTicketInstanceDetails {
    pub confirmation_code: Option<String>,
    pub seat_number: Option<String>,
    pub section: Option<String>,
    pub row_label: Option<String>,
    pub gate: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyInstanceDetails {
    pub member_id: Option<String>,
    pub points: Option<i64>,
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCardInstanceDetails {
    pub card_number: Option<String>,
    /// Decimal string, e.g. `50.00`; never parsed to float.
    pub balance: Option<String>,
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitInstanceDetails {
    pub ticket_number: Option<String>,
    pub zone: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
}

/// Type-specific scalar child record of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class_type", rename_all = "snake_case")]
pub enum InstanceDetails {
    Generic(GenericInstanceDetails),
    EventTicket(EventTicketInstanceDetails),
    Loyalty(LoyaltyInstanceDetails),
    GiftCard(GiftCardInstanceDetails),
    Transit(TransitInstanceDetails),
}

impl InstanceDetails {
    /// Returns an all-empty record of the given type.
    pub fn empty(class_type: ClassType) -> Self {
        match class_type {
            ClassType::Generic => Self::Generic(GenericInstanceDetails::default()),
            ClassType::EventTicket => Self::EventTicket(EventTicketInstanceDetails::default()),
            ClassType::Loyalty => Self::Loyalty(LoyaltyInstanceDetails::default()),
            ClassType::GiftCard => Self::GiftCard(GiftCardInstanceDetails::default()),
            ClassType::Transit => Self::Transit(TransitInstanceDetails::default()),
        }
    }

    pub fn class_type(&self) -> ClassType {
        match self {
            Self::Generic(_) => ClassType::Generic,
            Self::EventTicket(_) => ClassType::EventTicket,
            Self::Loyalty(_) => ClassType::Loyalty,
            Self::GiftCard(_) => ClassType::GiftCard,
            Self::Transit(_) => ClassType::Transit,
        }
    }

    /// Checks the shape against the owning template's type.
    pub fn ensure_matches(&self, template_type: ClassType) -> Result<(), ModelValidationError> {
        if self.class_type() != template_type {
            return Err(ModelValidationError::DetailsMismatch {
                expected: template_type,
                actual: self.class_type(),
            });
        }
        Ok(())
    }
}

/// One entry of the ordered text-module collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextModule {
    pub id: String,
    pub header: Option<String>,
    pub body: Option<String>,
}

impl TextModule {
    /// Creates a module with a generated id.
    pub fn new(header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            header: Some(header.into()),
            body: Some(body.into()),
        }
    }
}

/// One entry of the ordered message collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassMessage {
    pub id: String,
    pub header: Option<String>,
    pub body: Option<String>,
    /// Provider message type, e.g. `TEXT` or `EXPIRATION_NOTIFICATION`.
    pub message_type: Option<String>,
    pub display_start: Option<String>,
    pub display_end: Option<String>,
}

impl PassMessage {
    /// Creates a plain text message with a generated id and no display window.
    pub fn new(header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            header: Some(header.into()),
            body: Some(body.into()),
            message_type: Some("TEXT".to_string()),
            display_start: None,
            display_end: None,
        }
    }
}

/// Fully hydrated instance: core row, type child and both collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassInstance {
    pub object_id: ObjectId,
    pub class_id: ClassId,
    pub holder_name: String,
    pub holder_email: String,
    pub status: InstanceStatus,
    pub sync_status: SyncStatus,
    /// Epoch milliseconds of the last successful push.
    pub last_synced_at: Option<i64>,
    pub details: InstanceDetails,
    pub text_modules: Vec<TextModule>,
    pub messages: Vec<PassMessage>,
}

impl PassInstance {
    /// Creates an active, not yet synced instance with empty collections.
    pub fn new(
        object_id: impl Into<ObjectId>,
        class_id: impl Into<ClassId>,
        holder_name: impl Into<String>,
        holder_email: impl Into<String>,
        details: InstanceDetails,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            class_id: class_id.into(),
            holder_name: holder_name.into(),
            holder_email: holder_email.into(),
            status: InstanceStatus::Active,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
            details,
            text_modules: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn class_type(&self) -> ClassType {
        self.details.class_type()
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        check_id("object_id", &self.object_id)?;
        check_id("class_id", &self.class_id)?;
        check_email(&self.holder_email)
    }

    /// Check for records that may come from the provider: passes issued
    /// without an account carry an empty holder email, which is kept.
    pub fn validate_reconciled(&self) -> Result<(), ModelValidationError> {
        check_id("object_id", &self.object_id)?;
        check_id("class_id", &self.class_id)?;
        if self.holder_email.is_empty() {
            return Ok(());
        }
        check_email(&self.holder_email)
    }
}

/// Partial instance update. `Some` means "apply this field"; for the two
/// collections `Some(vec![])` clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePatch {
    pub holder_name: Option<String>,
    pub holder_email: Option<String>,
    pub status: Option<InstanceStatus>,
    /// Replaces the whole type-specific record.
    pub details: Option<InstanceDetails>,
    pub text_modules: Option<Vec<TextModule>>,
    pub messages: Option<Vec<PassMessage>>,
}

impl InstancePatch {
    pub fn is_empty(&self) -> bool {
        self.holder_name.is_none()
            && self.holder_email.is_none()
            && self.status.is_none()
            && self.details.is_none()
            && self.text_modules.is_none()
            && self.messages.is_none()
    }

    pub fn validate_for(&self, template_type: ClassType) -> Result<(), ModelValidationError> {
        if self.is_empty() {
            return Err(ModelValidationError::EmptyPatch);
        }
        if let Some(email) = self.holder_email.as_deref() {
            check_email(email)?;
        }
        if let Some(details) = self.details.as_ref() {
            details.ensure_matches(template_type)?;
        }
        Ok(())
    }

    /// Returns `current` with every `Some` field of this patch applied.
    pub fn apply_to(&self, current: &PassInstance) -> PassInstance {
        let mut next = current.clone();
        if let Some(holder_name) = &self.holder_name {
            next.holder_name = holder_name.clone();
        }
        if let Some(holder_email) = &self.holder_email {
            next.holder_email = holder_email.clone();
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(details) = &self.details {
            next.details = details.clone();
        }
        if let Some(text_modules) = &self.text_modules {
            next.text_modules = text_modules.clone();
        }
        if let Some(messages) = &self.messages {
            next.messages = messages.clone();
        }
        next
    }
}
