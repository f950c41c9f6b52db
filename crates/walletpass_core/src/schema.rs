//! Per-type field catalogs and placeholder documents.
//!
//! # Responsibility
//! - Describe the editable paths of each class type's canonical document.
//! - Describe the holder-facing paths of each instance document.
//! - Produce a default class document with placeholder values.
//!
//! # Invariants
//! - Every class catalog path resolves in `template_for(t, &[])` for type `t`.
//! - Catalog order is presentation order and is stable.

use crate::document::class_doc::synthesize_class_document;
use crate::document::tree::{set_path, DEFAULT_LANGUAGE};
use crate::model::template::{
    ClassType, EventTicketDetails, GenericDetails, GiftCardDetails, LoyaltyDetails, PassTemplate,
    TemplateDetails, TransitDetails,
};
use serde::Serialize;
use serde_json::Value;

const LOCALIZED_SUFFIX: &str = ".defaultValue.value";

pub const TRANSIT_TYPES: &[&str] = &[
    "TRANSIT_TYPE_BUS",
    "TRANSIT_TYPE_RAIL",
    "TRANSIT_TYPE_TRAM",
    "TRANSIT_TYPE_FERRY",
    "TRANSIT_TYPE_OTHER",
];

/// Editor widget hint for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Color,
    Url,
    DateTime,
    Date,
    Number,
    Select,
}

/// One editable field of a canonical document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Dot path into the canonical document.
    pub path: &'static str,
    pub label: &'static str,
    pub input_kind: InputKind,
    pub hint: &'static str,
    /// Allowed values; empty unless `input_kind` is `Select`.
    pub options: &'static [&'static str],
}

const fn field(
    path: &'static str,
    label: &'static str,
    input_kind: InputKind,
    hint: &'static str,
) -> FieldSpec {
    FieldSpec {
        path,
        label,
        input_kind,
        hint,
        options: &[],
    }
}

/// Ordered class-level catalog for `class_type`.
pub fn fields_for(class_type: ClassType) -> Vec<FieldSpec> {
    let mut fields = vec![field(
        "hexBackgroundColor",
        "Background Color",
        InputKind::Color,
        "#4285f4",
    )];

    match class_type {
        ClassType::Loyalty | ClassType::GiftCard => {
            fields.push(field(
                "localizedIssuerName.defaultValue.value",
                "Issuer Name",
                InputKind::Text,
                "Your Business Name",
            ));
        }
        _ => fields.push(field(
            "issuerName",
            "Issuer Name",
            InputKind::Text,
            "Your Business",
        )),
    }

    match class_type {
        ClassType::Generic => {
            fields.push(field(
                "header.defaultValue.value",
                "Header Text",
                InputKind::Text,
                "Business Name",
            ));
            fields.push(field(
                "cardTitle.defaultValue.value",
                "Card Title",
                InputKind::Text,
                "Pass Title",
            ));
        }
        ClassType::EventTicket => {
            fields.push(field(
                "eventName.defaultValue.value",
                "Event Name",
                InputKind::Text,
                "Event Name",
            ));
            fields.push(field(
                "venue.name.defaultValue.value",
                "Venue Name",
                InputKind::Text,
                "Venue Name",
            ));
            fields.push(field(
                "venue.address.defaultValue.value",
                "Venue Address",
                InputKind::Text,
                "123 Main St, City",
            ));
            fields.push(field(
                "dateTime.start",
                "Event Start Time",
                InputKind::DateTime,
                "2025-12-31T19:00:00",
            ));
        }
        ClassType::Loyalty => fields.push(field(
            "programName",
            "Program Name",
            InputKind::Text,
            "Loyalty Program",
        )),
        ClassType::GiftCard => {
            fields.push(field(
                "merchantName",
                "Merchant Name",
                InputKind::Text,
                "Your Store",
            ));
            fields.push(field(
                "cardNumber",
                "Card Number",
                InputKind::Text,
                "1234-5678-9012",
            ));
        }
        ClassType::Transit => {
            fields.push(FieldSpec {
                options: TRANSIT_TYPES,
                ..field(
                    "transitType",
                    "Transit Type",
                    InputKind::Select,
                    "TRANSIT_TYPE_BUS",
                )
            });
            fields.push(field(
                "transitOperatorName.defaultValue.value",
                "Operator Name",
                InputKind::Text,
                "Transit Authority",
            ));
        }
    }

    let logo_path = match class_type {
        ClassType::Loyalty | ClassType::GiftCard => "programLogo.sourceUri.uri",
        _ => "logo.sourceUri.uri",
    };
    fields.push(field(
        logo_path,
        "Logo URL",
        InputKind::Url,
        "https://example.com/logo.png",
    ));
    fields.push(field(
        "heroImage.sourceUri.uri",
        "Hero Image URL",
        InputKind::Url,
        "https://example.com/hero.jpg (1032x336px recommended)",
    ));
    fields
}

/// Ordered holder-facing catalog for instances of `class_type`.
pub fn instance_fields_for(class_type: ClassType) -> Vec<FieldSpec> {
    match class_type {
        ClassType::Generic => vec![
            field("header.defaultValue.value", "Header", InputKind::Text, "Custom header"),
            field(
                "subheader.defaultValue.value",
                "Subheader",
                InputKind::Text,
                "Custom subheader",
            ),
        ],
        ClassType::EventTicket => vec![
            field("seatInfo.seat.defaultValue.value", "Seat Number", InputKind::Text, "e.g., A12"),
            field(
                "seatInfo.section.defaultValue.value",
                "Section",
                InputKind::Text,
                "e.g., North Stand",
            ),
            field("seatInfo.row.defaultValue.value", "Row", InputKind::Text, "e.g., 5"),
            field("seatInfo.gate.defaultValue.value", "Gate", InputKind::Text, "e.g., Gate 5"),
            field(
                "reservationInfo.confirmationCode",
                "Confirmation Code",
                InputKind::Text,
                "e.g., ABC123",
            ),
        ],
        ClassType::Loyalty => vec![
            field("barcode.value", "Member ID", InputKind::Text, "e.g., MEMBER123"),
            field("loyaltyPoints.balance.int", "Points", InputKind::Number, "e.g., 1000"),
            field(
                "loyaltyPoints.label",
                "Tier",
                InputKind::Text,
                "e.g., Gold, Silver, Bronze",
            ),
        ],
        ClassType::GiftCard => vec![
            field("cardNumber", "Card Number", InputKind::Text, "e.g., 1234-5678-9012"),
            field("balance.amount", "Balance", InputKind::Number, "e.g., 50.00"),
            field(
                "validTimeInterval.end.date",
                "Expiry Date",
                InputKind::Date,
                "e.g., 2025-12-31",
            ),
        ],
        ClassType::Transit => vec![
            field("ticketNumber", "Ticket Number", InputKind::Text, "e.g., T-0001"),
            field(
                "ticketLeg.fareName.defaultValue.value",
                "Zone",
                InputKind::Text,
                "e.g., Zone 1-2",
            ),
            field(
                "validTimeInterval.start.date",
                "Valid From",
                InputKind::Date,
                "e.g., 2024-12-01",
            ),
            field(
                "validTimeInterval.end.date",
                "Valid Until",
                InputKind::Date,
                "e.g., 2024-12-31",
            ),
        ],
    }
}

/// Default class document for `class_type` with `overrides` applied by path.
///
/// The result carries no `id` unless an override sets one. Overriding a
/// localized value also stamps the sibling `language` key.
pub fn template_for(class_type: ClassType, overrides: &[(&str, &str)]) -> Value {
    let mut doc = synthesize_class_document(&placeholder_template(class_type));
    if let Some(map) = doc.as_object_mut() {
        map.remove("id");
    }
    for (path, value) in overrides {
        set_path(&mut doc, path, Value::String((*value).to_string()));
        if let Some(parent) = path.strip_suffix(LOCALIZED_SUFFIX) {
            set_path(
                &mut doc,
                &format!("{parent}.defaultValue.language"),
                Value::String(DEFAULT_LANGUAGE.to_string()),
            );
        }
    }
    doc
}

fn placeholder_template(class_type: ClassType) -> PassTemplate {
    let (color, details) = match class_type {
        ClassType::Generic => (
            "#4285f4",
            TemplateDetails::Generic(GenericDetails {
                header_text: Some("Business Name".to_string()),
                card_title: Some("Pass Title".to_string()),
            }),
        ),
        ClassType::EventTicket => (
            "#4285f4",
            TemplateDetails::EventTicket(EventTicketDetails {
                event_name: "Event Name".to_string(),
                venue_name: Some("Venue Name".to_string()),
                venue_address: Some("123 Main St, City".to_string()),
                event_start: Some("2025-12-31T19:00:00".to_string()),
            }),
        ),
        ClassType::Loyalty => (
            "#72461d",
            TemplateDetails::Loyalty(LoyaltyDetails {
                program_name: "Loyalty Program".to_string(),
            }),
        ),
        ClassType::GiftCard => (
            "#358b1d",
            TemplateDetails::GiftCard(GiftCardDetails {
                merchant_name: "Your Store".to_string(),
                card_number: "0000-0000-0000".to_string(),
            }),
        ),
        ClassType::Transit => (
            "#1a73e8",
            TemplateDetails::Transit(TransitDetails {
                transit_type: "TRANSIT_TYPE_BUS".to_string(),
                transit_operator_name: Some("Transit Authority".to_string()),
            }),
        ),
    };

    PassTemplate {
        class_id: String::new(),
        issuer_name: Some("Your Business".to_string()),
        base_color: Some(color.to_string()),
        logo_url: Some("https://example.com/logo.png".to_string()),
        hero_image_url: Some("https://example.com/hero.jpg".to_string()),
        details,
    }
}
