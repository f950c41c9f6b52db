//! Remote pass-provider seam.
//!
//! # Responsibility
//! - Define the synchronous gateway contract the services push through.
//! - Name the provider resource kinds and their probe priority.
//! - Classify remote failures into fatal and non-fatal outcomes.
//!
//! # Invariants
//! - `NotFound` and `BadRequest` are non-fatal during probing; every other
//!   failure aborts the caller immediately.
//! - Gateways receive fully qualified identifiers only.

use crate::model::template::ClassType;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod resolver;

pub use resolver::{IdentifierResolver, ProbeOutcome, ResolveError, Resolved, UpsertAction};

/// Provider pass family. Wider than [`ClassType`]: the provider also knows
/// offers and flights, which are probed but never stored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassFamily {
    Generic,
    Loyalty,
    Offer,
    GiftCard,
    Transit,
    Flight,
    EventTicket,
}

impl PassFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Loyalty => "loyalty",
            Self::Offer => "offer",
            Self::GiftCard => "giftCard",
            Self::Transit => "transit",
            Self::Flight => "flight",
            Self::EventTicket => "eventTicket",
        }
    }

    pub fn for_class_type(class_type: ClassType) -> Self {
        match class_type {
            ClassType::Generic => Self::Generic,
            ClassType::EventTicket => Self::EventTicket,
            ClassType::Loyalty => Self::Loyalty,
            ClassType::GiftCard => Self::GiftCard,
            ClassType::Transit => Self::Transit,
        }
    }

    /// Local class type, when this family is stored locally.
    pub fn class_type(self) -> Option<ClassType> {
        match self {
            Self::Generic => Some(ClassType::Generic),
            Self::Loyalty => Some(ClassType::Loyalty),
            Self::GiftCard => Some(ClassType::GiftCard),
            Self::Transit => Some(ClassType::Transit),
            Self::EventTicket => Some(ClassType::EventTicket),
            Self::Offer | Self::Flight => None,
        }
    }
}

/// Probe order for template (class) lookups.
pub const TEMPLATE_PROBE_ORDER: [PassFamily; 7] = [
    PassFamily::Generic,
    PassFamily::Loyalty,
    PassFamily::Offer,
    PassFamily::GiftCard,
    PassFamily::Transit,
    PassFamily::Flight,
    PassFamily::EventTicket,
];

/// Probe order for instance (object) lookups.
pub const INSTANCE_PROBE_ORDER: [PassFamily; 5] = [
    PassFamily::Generic,
    PassFamily::Loyalty,
    PassFamily::GiftCard,
    PassFamily::Transit,
    PassFamily::EventTicket,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceLevel {
    Class,
    Object,
}

/// One remote collection, e.g. `eventTicketClass` or `loyaltyObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub family: PassFamily,
    pub level: ResourceLevel,
}

impl ResourceKind {
    pub const fn class(family: PassFamily) -> Self {
        Self {
            family,
            level: ResourceLevel::Class,
        }
    }

    pub const fn object(family: PassFamily) -> Self {
        Self {
            family,
            level: ResourceLevel::Object,
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let suffix = match self.level {
            ResourceLevel::Class => "Class",
            ResourceLevel::Object => "Object",
        };
        write!(f, "{}{suffix}", self.family.as_str())
    }
}

/// Filter for list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Restricts object listings to one qualified class id.
    pub class_id: Option<String>,
}

impl ListFilter {
    pub fn for_class(class_id: impl Into<String>) -> Self {
        Self {
            class_id: Some(class_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    /// Auth, quota, transport, server errors.
    Other,
}

/// Remote call failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    /// HTTP-style status when the transport reported one.
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Classifies a status code the way the provider reports failures.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            404 => GatewayErrorKind::NotFound,
            400 => GatewayErrorKind::BadRequest,
            409 => GatewayErrorKind::Conflict,
            _ => GatewayErrorKind::Other,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Conflict, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Other, message)
    }

    /// True when a probe may advance to the next candidate.
    pub fn is_non_fatal(&self) -> bool {
        matches!(
            self.kind,
            GatewayErrorKind::NotFound | GatewayErrorKind::BadRequest
        )
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "remote error ({status}): {}", self.message),
            None => write!(f, "remote error: {}", self.message),
        }
    }
}

impl Error for GatewayError {}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Synchronous remote pass provider.
///
/// Implementations block for the duration of one round-trip and apply no
/// retries of their own.
pub trait PassGateway: Send + Sync {
    fn get(&self, kind: ResourceKind, id: &str) -> GatewayResult<Value>;
    /// Creates a resource; fails with `Conflict` when the id already exists.
    fn insert(&self, kind: ResourceKind, document: &Value) -> GatewayResult<Value>;
    fn patch(&self, kind: ResourceKind, id: &str, document: &Value) -> GatewayResult<Value>;
    fn list(&self, kind: ResourceKind, filter: &ListFilter) -> GatewayResult<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::{GatewayError, GatewayErrorKind, PassFamily, ResourceKind};
    use crate::model::template::ClassType;

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(GatewayError::from_status(404, "x").kind, GatewayErrorKind::NotFound);
        assert_eq!(GatewayError::from_status(400, "x").kind, GatewayErrorKind::BadRequest);
        assert_eq!(GatewayError::from_status(409, "x").kind, GatewayErrorKind::Conflict);
        assert_eq!(GatewayError::from_status(403, "x").kind, GatewayErrorKind::Other);
        assert!(GatewayError::from_status(400, "x").is_non_fatal());
        assert!(!GatewayError::from_status(500, "x").is_non_fatal());
    }

    #[test]
    fn resource_kind_display_uses_provider_names() {
        assert_eq!(
            ResourceKind::class(PassFamily::EventTicket).to_string(),
            "eventTicketClass"
        );
        assert_eq!(
            ResourceKind::object(PassFamily::GiftCard).to_string(),
            "giftCardObject"
        );
    }

    #[test]
    fn families_round_trip_local_class_types() {
        for class_type in ClassType::ALL {
            assert_eq!(
                PassFamily::for_class_type(class_type).class_type(),
                Some(class_type)
            );
        }
        assert_eq!(PassFamily::Flight.class_type(), None);
    }
}
