//! Template (class) document synthesis and parsing.

use super::tree::{get_string, localized_value, set_localized, set_opt};
use super::{DocumentError, DocumentResult};
use crate::model::template::{
    ClassType, EventTicketDetails, GenericDetails, GiftCardDetails, LoyaltyDetails, PassTemplate,
    TemplateDetails, TransitDetails,
};
use serde_json::{json, Value};

/// Builds the canonical provider class document for a template.
///
/// `id` carries the local class id; callers qualify it before pushing.
pub fn synthesize_class_document(template: &PassTemplate) -> Value {
    let mut doc = json!({ "id": template.class_id });
    let class_type = template.class_type();
    let issuer = template.issuer_name.as_deref();

    if uses_program_branding(class_type) {
        set_localized(&mut doc, "localizedIssuerName", issuer);
        set_opt(&mut doc, "programLogo.sourceUri.uri", template.logo_url.as_deref());
    } else {
        set_opt(&mut doc, "issuerName", issuer);
        set_opt(&mut doc, "logo.sourceUri.uri", template.logo_url.as_deref());
    }
    set_opt(&mut doc, "hexBackgroundColor", template.base_color.as_deref());
    set_opt(
        &mut doc,
        "heroImage.sourceUri.uri",
        template.hero_image_url.as_deref(),
    );

    match &template.details {
        TemplateDetails::Generic(details) => {
            set_localized(&mut doc, "header", details.header_text.as_deref());
            set_localized(&mut doc, "cardTitle", details.card_title.as_deref());
        }
        TemplateDetails::EventTicket(details) => {
            set_localized(&mut doc, "eventName", Some(details.event_name.as_str()));
            set_localized(&mut doc, "venue.name", details.venue_name.as_deref());
            set_localized(&mut doc, "venue.address", details.venue_address.as_deref());
            set_opt(&mut doc, "dateTime.start", details.event_start.as_deref());
        }
        TemplateDetails::Loyalty(details) => {
            set_opt(&mut doc, "programName", Some(details.program_name.as_str()));
        }
        TemplateDetails::GiftCard(details) => {
            set_opt(&mut doc, "merchantName", Some(details.merchant_name.as_str()));
            set_opt(&mut doc, "cardNumber", Some(details.card_number.as_str()));
        }
        TemplateDetails::Transit(details) => {
            set_opt(&mut doc, "transitType", Some(details.transit_type.as_str()));
            set_localized(
                &mut doc,
                "transitOperatorName",
                details.transit_operator_name.as_deref(),
            );
        }
    }
    doc
}

/// Infers the class type from the presence of discriminating keys.
///
/// Order: event name, program name, merchant name with card number,
/// transit type, otherwise generic.
pub fn detect_class_type(doc: &Value) -> ClassType {
    let has = |key: &str| doc.get(key).is_some_and(|value| !value.is_null());
    if has("eventName") {
        ClassType::EventTicket
    } else if has("programName") || has("localizedProgramName") {
        ClassType::Loyalty
    } else if has("merchantName") && has("cardNumber") {
        ClassType::GiftCard
    } else if has("transitType") {
        ClassType::Transit
    } else {
        ClassType::Generic
    }
}

/// Maps a provider class document back to a template record.
///
/// The class id has any numeric issuer prefix removed. Both issuer-name
/// encodings and both logo locations are accepted for every type.
pub fn parse_provider_document(doc: &Value) -> DocumentResult<PassTemplate> {
    if !doc.is_object() {
        return Err(DocumentError::NotAnObject);
    }
    let id = get_string(doc, "id").ok_or(DocumentError::MissingField("id"))?;

    let details = match detect_class_type(doc) {
        ClassType::Generic => TemplateDetails::Generic(GenericDetails {
            header_text: localized_value(doc, "header"),
            card_title: localized_value(doc, "cardTitle"),
        }),
        ClassType::EventTicket => TemplateDetails::EventTicket(EventTicketDetails {
            event_name: text_or_localized(doc, "eventName").unwrap_or_default(),
            venue_name: localized_value(doc, "venue.name"),
            venue_address: localized_value(doc, "venue.address"),
            event_start: get_string(doc, "dateTime.start"),
        }),
        ClassType::Loyalty => TemplateDetails::Loyalty(LoyaltyDetails {
            program_name: get_string(doc, "programName")
                .or_else(|| localized_value(doc, "localizedProgramName"))
                .unwrap_or_default(),
        }),
        ClassType::GiftCard => TemplateDetails::GiftCard(GiftCardDetails {
            merchant_name: get_string(doc, "merchantName").unwrap_or_default(),
            card_number: get_string(doc, "cardNumber").unwrap_or_default(),
        }),
        ClassType::Transit => TemplateDetails::Transit(TransitDetails {
            transit_type: get_string(doc, "transitType").unwrap_or_default(),
            transit_operator_name: localized_value(doc, "transitOperatorName"),
        }),
    };

    Ok(PassTemplate {
        class_id: strip_issuer_prefix(&id).to_string(),
        issuer_name: get_string(doc, "issuerName")
            .or_else(|| localized_value(doc, "localizedIssuerName")),
        base_color: get_string(doc, "hexBackgroundColor"),
        logo_url: get_string(doc, "logo.sourceUri.uri")
            .or_else(|| get_string(doc, "programLogo.sourceUri.uri")),
        hero_image_url: get_string(doc, "heroImage.sourceUri.uri"),
        details,
    })
}

/// Removes a leading all-digit issuer segment (`3388000000012345.EVT1` -> `EVT1`).
pub fn strip_issuer_prefix(id: &str) -> &str {
    match id.split_once('.') {
        Some((head, tail))
            if !head.is_empty() && !tail.is_empty() && head.bytes().all(|b| b.is_ascii_digit()) =>
        {
            tail
        }
        _ => id,
    }
}

/// True when the document carries anything beyond its identifier.
///
/// An id-only or empty document is treated as "nothing to push".
pub fn is_remote_shaped(doc: &Value) -> bool {
    doc.as_object()
        .is_some_and(|map| map.keys().any(|key| key != "id"))
}

fn uses_program_branding(class_type: ClassType) -> bool {
    matches!(class_type, ClassType::Loyalty | ClassType::GiftCard)
}

fn text_or_localized(doc: &Value, path: &str) -> Option<String> {
    get_string(doc, path).or_else(|| localized_value(doc, path))
}

#[cfg(test)]
mod tests {
    use super::{
        detect_class_type, is_remote_shaped, parse_provider_document, strip_issuer_prefix,
        synthesize_class_document,
    };
    use crate::document::DocumentError;
    use crate::model::template::{
        ClassType, EventTicketDetails, GenericDetails, GiftCardDetails, LoyaltyDetails,
        PassTemplate, TemplateDetails, TransitDetails,
    };
    use serde_json::json;

    fn with_common(class_id: &str, details: TemplateDetails) -> PassTemplate {
        PassTemplate {
            class_id: class_id.to_string(),
            issuer_name: Some("Acme Events".to_string()),
            base_color: Some("#112233".to_string()),
            logo_url: Some("https://img.example.com/logo.png".to_string()),
            hero_image_url: Some("https://img.example.com/hero.png".to_string()),
            details,
        }
    }

    fn samples() -> Vec<PassTemplate> {
        vec![
            with_common(
                "GEN1",
                TemplateDetails::Generic(GenericDetails {
                    header_text: Some("Member".to_string()),
                    card_title: Some("Acme Club".to_string()),
                }),
            ),
            with_common(
                "EVT1",
                TemplateDetails::EventTicket(EventTicketDetails {
                    event_name: "Cup Final".to_string(),
                    venue_name: Some("Hall A".to_string()),
                    venue_address: Some("1 Main St".to_string()),
                    event_start: Some("2026-06-01T19:00".to_string()),
                }),
            ),
            with_common(
                "LOY1",
                TemplateDetails::Loyalty(LoyaltyDetails {
                    program_name: "Acme Rewards".to_string(),
                }),
            ),
            with_common(
                "GC1",
                TemplateDetails::GiftCard(GiftCardDetails {
                    merchant_name: "Acme Store".to_string(),
                    card_number: "4000-1234".to_string(),
                }),
            ),
            with_common(
                "TR1",
                TemplateDetails::Transit(TransitDetails {
                    transit_type: "TRANSIT_TYPE_BUS".to_string(),
                    transit_operator_name: Some("Metro".to_string()),
                }),
            ),
        ]
    }

    #[test]
    fn every_type_survives_synthesize_then_parse() {
        for template in samples() {
            let doc = synthesize_class_document(&template);
            assert_eq!(detect_class_type(&doc), template.class_type());
            let parsed = parse_provider_document(&doc).expect("parse synthesized document");
            assert_eq!(parsed, template);
        }
    }

    #[test]
    fn dotted_class_ids_survive_round_trip() {
        let template = with_common(
            "SUMMER.2026",
            TemplateDetails::Loyalty(LoyaltyDetails {
                program_name: "Summer Club".to_string(),
            }),
        );
        assert!(template.validate().is_ok());
        let parsed = parse_provider_document(&synthesize_class_document(&template)).unwrap();
        assert_eq!(parsed, template);

        let numeric_head = PassTemplate {
            class_id: "2026.SUMMER".to_string(),
            ..template
        };
        assert!(numeric_head.validate().is_err());
    }

    #[test]
    fn absent_fields_are_omitted_not_null() {
        let template = PassTemplate::new("GEN2", TemplateDetails::Generic(GenericDetails::default()));
        let doc = synthesize_class_document(&template);
        assert_eq!(doc, json!({ "id": "GEN2" }));
        assert!(!is_remote_shaped(&doc));
    }

    #[test]
    fn loyalty_uses_localized_issuer_and_program_logo() {
        let doc = synthesize_class_document(&samples()[2]);
        assert_eq!(
            doc["localizedIssuerName"]["defaultValue"]["value"],
            "Acme Events"
        );
        assert!(doc.get("issuerName").is_none());
        assert_eq!(
            doc["programLogo"]["sourceUri"]["uri"],
            "https://img.example.com/logo.png"
        );
    }

    #[test]
    fn event_ticket_venue_is_nested_and_localized() {
        let doc = synthesize_class_document(&samples()[1]);
        assert_eq!(doc["venue"]["name"]["defaultValue"]["value"], "Hall A");
        assert_eq!(doc["venue"]["name"]["defaultValue"]["language"], "en-US");
        assert_eq!(doc["dateTime"]["start"], "2026-06-01T19:00");
    }

    #[test]
    fn parse_strips_numeric_issuer_prefix_and_accepts_either_issuer_encoding() {
        let doc = json!({
            "id": "3388000000012345.GEN9",
            "localizedIssuerName": { "defaultValue": { "language": "en-US", "value": "Acme" } },
            "logo": { "sourceUri": { "uri": "https://x/logo.png" } },
            "reviewStatus": "APPROVED"
        });
        let parsed = parse_provider_document(&doc).unwrap();
        assert_eq!(parsed.class_id, "GEN9");
        assert_eq!(parsed.issuer_name.as_deref(), Some("Acme"));
        assert_eq!(parsed.logo_url.as_deref(), Some("https://x/logo.png"));
        assert_eq!(parsed.class_type(), ClassType::Generic);
    }

    #[test]
    fn gift_card_needs_both_merchant_and_card_number() {
        let merchant_only = json!({ "id": "X", "merchantName": "Acme" });
        assert_eq!(detect_class_type(&merchant_only), ClassType::Generic);
    }

    #[test]
    fn parse_rejects_missing_id() {
        assert_eq!(
            parse_provider_document(&json!({ "eventName": "x" })),
            Err(DocumentError::MissingField("id"))
        );
        assert_eq!(
            parse_provider_document(&json!("EVT1")),
            Err(DocumentError::NotAnObject)
        );
    }

    #[test]
    fn strip_issuer_prefix_only_removes_digit_segments() {
        assert_eq!(strip_issuer_prefix("3388000000012345.EVT1"), "EVT1");
        assert_eq!(strip_issuer_prefix("EVT1"), "EVT1");
        assert_eq!(strip_issuer_prefix("acme.EVT1"), "acme.EVT1");
        assert_eq!(strip_issuer_prefix("123."), "123.");
    }
}
