//! Pass template (class) model.
//!
//! # Responsibility
//! - Define the common visual attributes shared by every template.
//! - Define one type-specific detail record per class type.
//! - Define the explicit partial-update shape for template edits.
//!
//! # Invariants
//! - `class_id` is a whitespace-free business key without issuer prefix.
//! - Type-discriminating fields (event name, program name, merchant name and
//!   card number, transit type) are non-empty so type detection round-trips.

use crate::model::validation::{check_color, check_id, check_required, ModelValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Local template business key.
pub type ClassId = String;

/// Pass template family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    Generic,
    EventTicket,
    Loyalty,
    GiftCard,
    Transit,
}

impl ClassType {
    pub const ALL: [ClassType; 5] = [
        ClassType::Generic,
        ClassType::EventTicket,
        ClassType::Loyalty,
        ClassType::GiftCard,
        ClassType::Transit,
    ];

    /// Storage form used in `pass_templates.class_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::EventTicket => "event_ticket",
            Self::Loyalty => "loyalty",
            Self::GiftCard => "gift_card",
            Self::Transit => "transit",
        }
    }

    /// Human-facing name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Generic => "Generic",
            Self::EventTicket => "EventTicket",
            Self::Loyalty => "Loyalty",
            Self::GiftCard => "GiftCard",
            Self::Transit => "Transit",
        }
    }

    /// Parses storage form or display name, including legacy aliases
    /// (`LoyaltyCard`, `TransitPass`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "generic" | "Generic" => Some(Self::Generic),
            "event_ticket" | "EventTicket" => Some(Self::EventTicket),
            "loyalty" | "Loyalty" | "LoyaltyCard" => Some(Self::Loyalty),
            "gift_card" | "GiftCard" => Some(Self::GiftCard),
            "transit" | "Transit" | "TransitPass" => Some(Self::Transit),
            _ => None,
        }
    }
}

impl Display for ClassType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericDetails {
    pub header_text: Option<String>,
    pub card_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTicketDetails {
    pub event_name: String,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    /// ISO-8601 local date-time, stored verbatim.
    pub event_start: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyDetails {
    pub program_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCardDetails {
    pub merchant_name: String,
    pub card_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitDetails {
    /// Provider enum value, e.g. `TRANSIT_TYPE_BUS`.
    pub transit_type: String,
    pub transit_operator_name: Option<String>,
}

/// Type-specific child record of a template.
///
/// Serialized with a `class_type` tag so the shape is self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class_type", rename_all = "snake_case")]
pub enum TemplateDetails {
    Generic(GenericDetails),
    EventTicket(EventTicketDetails),
    Loyalty(LoyaltyDetails),
    GiftCard(GiftCardDetails),
    Transit(TransitDetails),
}

impl TemplateDetails {
    pub fn class_type(&self) -> ClassType {
        match self {
            Self::Generic(_) => ClassType::Generic,
            Self::EventTicket(_) => ClassType::EventTicket,
            Self::Loyalty(_) => ClassType::Loyalty,
            Self::GiftCard(_) => ClassType::GiftCard,
            Self::Transit(_) => ClassType::Transit,
        }
    }

    fn validate(&self) -> Result<(), ModelValidationError> {
        match self {
            Self::Generic(_) => Ok(()),
            Self::EventTicket(details) => check_required("event_name", &details.event_name),
            Self::Loyalty(details) => check_required("program_name", &details.program_name),
            Self::GiftCard(details) => {
                check_required("merchant_name", &details.merchant_name)?;
                check_required("card_number", &details.card_number)
            }
            Self::Transit(details) => check_required("transit_type", &details.transit_type),
        }
    }
}

/// Canonical template record: parent row plus its single type-specific child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassTemplate {
    pub class_id: ClassId,
    pub issuer_name: Option<String>,
    /// `#RRGGBB` background colour.
    pub base_color: Option<String>,
    pub logo_url: Option<String>,
    pub hero_image_url: Option<String>,
    pub details: TemplateDetails,
}

impl PassTemplate {
    /// Creates a template with no common attributes set.
    pub fn new(class_id: impl Into<ClassId>, details: TemplateDetails) -> Self {
        Self {
            class_id: class_id.into(),
            issuer_name: None,
            base_color: None,
            logo_url: None,
            hero_image_url: None,
            details,
        }
    }

    pub fn class_type(&self) -> ClassType {
        self.details.class_type()
    }

    /// Validates the record before persistence.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        check_id("class_id", &self.class_id)?;
        check_color(self.base_color.as_deref())?;
        self.details.validate()
    }
}

/// Partial template update. `Some` means "apply this field".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePatch {
    /// Accepted only when equal to the current type.
    pub class_type: Option<ClassType>,
    pub issuer_name: Option<String>,
    pub base_color: Option<String>,
    pub logo_url: Option<String>,
    pub hero_image_url: Option<String>,
    pub header_text: Option<String>,
    pub card_title: Option<String>,
    pub event_name: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub event_start: Option<String>,
    pub program_name: Option<String>,
    pub merchant_name: Option<String>,
    pub card_number: Option<String>,
    pub transit_type: Option<String>,
    pub transit_operator_name: Option<String>,
}

impl TemplatePatch {
    pub fn is_empty(&self) -> bool {
        self.class_type.is_none()
            && self.common_fields().iter().all(|(_, value)| value.is_none())
            && self.type_fields().iter().all(|(_, _, value)| value.is_none())
    }

    /// Common parent-row columns paired with their patch values.
    pub fn common_fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("issuer_name", self.issuer_name.as_deref()),
            ("base_color", self.base_color.as_deref()),
            ("logo_url", self.logo_url.as_deref()),
            ("hero_image_url", self.hero_image_url.as_deref()),
        ]
    }

    /// Type-specific child columns, tagged with the class type owning them.
    pub fn type_fields(&self) -> [(ClassType, &'static str, Option<&str>); 11] {
        [
            (ClassType::Generic, "header_text", self.header_text.as_deref()),
            (ClassType::Generic, "card_title", self.card_title.as_deref()),
            (ClassType::EventTicket, "event_name", self.event_name.as_deref()),
            (ClassType::EventTicket, "venue_name", self.venue_name.as_deref()),
            (ClassType::EventTicket, "venue_address", self.venue_address.as_deref()),
            (ClassType::EventTicket, "event_start", self.event_start.as_deref()),
            (ClassType::Loyalty, "program_name", self.program_name.as_deref()),
            (ClassType::GiftCard, "merchant_name", self.merchant_name.as_deref()),
            (ClassType::GiftCard, "card_number", self.card_number.as_deref()),
            (ClassType::Transit, "transit_type", self.transit_type.as_deref()),
            (
                ClassType::Transit,
                "transit_operator_name",
                self.transit_operator_name.as_deref(),
            ),
        ]
    }

    /// Validates the patch against the template's current type.
    ///
    /// Rejects empty patches, type changes, fields of other types, bad colours
    /// and blanking of type-discriminating fields.
    pub fn validate_for(&self, current: ClassType) -> Result<(), ModelValidationError> {
        if self.is_empty() {
            return Err(ModelValidationError::EmptyPatch);
        }
        if let Some(requested) = self.class_type {
            if requested != current {
                return Err(ModelValidationError::ClassTypeChange {
                    from: current,
                    to: requested,
                });
            }
        }
        for (owner, field, value) in self.type_fields() {
            if value.is_some() && owner != current {
                return Err(ModelValidationError::ForeignField {
                    class_type: current,
                    field,
                });
            }
        }
        for field in ["event_name", "program_name", "merchant_name", "card_number", "transit_type"] {
            let value = self
                .type_fields()
                .into_iter()
                .find(|(_, name, _)| *name == field)
                .and_then(|(_, _, value)| value);
            if let Some(value) = value {
                check_required(field, value)?;
            }
        }
        check_color(self.base_color.as_deref())
    }

    /// Returns `current` with every `Some` field of this patch applied.
    ///
    /// Fields of other class types are ignored; call `validate_for` first.
    pub fn apply_to(&self, current: &PassTemplate) -> PassTemplate {
        let mut next = current.clone();
        assign(&mut next.issuer_name, &self.issuer_name);
        assign(&mut next.base_color, &self.base_color);
        assign(&mut next.logo_url, &self.logo_url);
        assign(&mut next.hero_image_url, &self.hero_image_url);

        match &mut next.details {
            TemplateDetails::Generic(details) => {
                assign(&mut details.header_text, &self.header_text);
                assign(&mut details.card_title, &self.card_title);
            }
            TemplateDetails::EventTicket(details) => {
                if let Some(event_name) = &self.event_name {
                    details.event_name = event_name.clone();
                }
                assign(&mut details.venue_name, &self.venue_name);
                assign(&mut details.venue_address, &self.venue_address);
                assign(&mut details.event_start, &self.event_start);
            }
            TemplateDetails::Loyalty(details) => {
                if let Some(program_name) = &self.program_name {
                    details.program_name = program_name.clone();
                }
            }
            TemplateDetails::GiftCard(details) => {
                if let Some(merchant_name) = &self.merchant_name {
                    details.merchant_name = merchant_name.clone();
                }
                if let Some(card_number) = &self.card_number {
                    details.card_number = card_number.clone();
                }
            }
            TemplateDetails::Transit(details) => {
                if let Some(transit_type) = &self.transit_type {
                    details.transit_type = transit_type.clone();
                }
                assign(
                    &mut details.transit_operator_name,
                    &self.transit_operator_name,
                );
            }
        }
        next
    }
}

fn assign(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *target = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ClassType, EventTicketDetails, GenericDetails, PassTemplate, TemplateDetails,
        TemplatePatch,
    };
    use crate::model::validation::ModelValidationError;

    fn event_details(name: &str) -> TemplateDetails {
        TemplateDetails::EventTicket(EventTicketDetails {
            event_name: name.to_string(),
            venue_name: None,
            venue_address: None,
            event_start: None,
        })
    }

    #[test]
    fn class_type_parses_storage_and_legacy_names() {
        for class_type in ClassType::ALL {
            assert_eq!(ClassType::parse(class_type.as_str()), Some(class_type));
            assert_eq!(ClassType::parse(class_type.display_name()), Some(class_type));
        }
        assert_eq!(ClassType::parse("LoyaltyCard"), Some(ClassType::Loyalty));
        assert_eq!(ClassType::parse("TransitPass"), Some(ClassType::Transit));
        assert_eq!(ClassType::parse("Flight"), None);
    }

    #[test]
    fn template_validation_requires_discriminator() {
        let template = PassTemplate::new("EVT1", event_details("  "));
        assert_eq!(
            template.validate(),
            Err(ModelValidationError::MissingField {
                field: "event_name"
            })
        );
        assert!(PassTemplate::new("EVT1", event_details("Final")).validate().is_ok());
    }

    #[test]
    fn patch_rejects_foreign_fields_and_type_change() {
        let patch = TemplatePatch {
            venue_name: Some("Hall B".to_string()),
            ..TemplatePatch::default()
        };
        assert!(patch.validate_for(ClassType::EventTicket).is_ok());
        assert!(matches!(
            patch.validate_for(ClassType::Generic),
            Err(ModelValidationError::ForeignField {
                field: "venue_name",
                ..
            })
        ));

        let retype = TemplatePatch {
            class_type: Some(ClassType::Loyalty),
            ..TemplatePatch::default()
        };
        assert!(matches!(
            retype.validate_for(ClassType::Generic),
            Err(ModelValidationError::ClassTypeChange { .. })
        ));
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert!(TemplatePatch::default().is_empty());
        assert_eq!(
            TemplatePatch::default().validate_for(ClassType::Generic),
            Err(ModelValidationError::EmptyPatch)
        );
        let same_type = TemplatePatch {
            class_type: Some(ClassType::Generic),
            ..TemplatePatch::default()
        };
        assert!(same_type.validate_for(ClassType::Generic).is_ok());
    }

    #[test]
    fn apply_to_only_touches_patched_fields() {
        let mut current = PassTemplate::new("EVT1", event_details("Final"));
        current.issuer_name = Some("Acme".to_string());
        let patch = TemplatePatch {
            venue_name: Some("Hall B".to_string()),
            ..TemplatePatch::default()
        };
        let next = patch.apply_to(&current);

        assert_eq!(next.issuer_name.as_deref(), Some("Acme"));
        match next.details {
            TemplateDetails::EventTicket(details) => {
                assert_eq!(details.event_name, "Final");
                assert_eq!(details.venue_name.as_deref(), Some("Hall B"));
            }
            other => panic!("unexpected details: {other:?}"),
        }
    }

    #[test]
    fn details_serialize_with_class_type_tag() {
        let details = TemplateDetails::Generic(GenericDetails {
            header_text: Some("Header".to_string()),
            card_title: None,
        });
        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["class_type"], "generic");
        assert_eq!(value["header_text"], "Header");
    }
}
