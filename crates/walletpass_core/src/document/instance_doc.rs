//! Instance (object) document synthesis and parsing.
//!
//! The provider document embeds the owning template's class document under
//! `classReference`, so pushing an instance also carries current template
//! content to the holder.

use super::class_doc::{strip_issuer_prefix, synthesize_class_document};
use super::tree::{get_path, get_str, get_string, localized_value, set_localized, set_opt, set_path};
use super::{DocumentError, DocumentResult};
use crate::model::instance::{
    EventTicketInstanceDetails, GenericInstanceDetails, GiftCardInstanceDetails, InstanceDetails,
    InstanceStatus, LoyaltyInstanceDetails, PassInstance, PassMessage, SyncStatus, TextModule,
    TransitInstanceDetails,
};
use crate::model::template::{ClassType, PassTemplate};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Synthesized instance document plus a flattened, unprefixed view.
///
/// The legacy view is lossy: instance fields shadow template fields of the
/// same name, and collections collapse to `header -> body` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDocument {
    pub document: Value,
    pub legacy: Map<String, Value>,
}

pub fn synthesize_instance_document(
    template: &PassTemplate,
    instance: &PassInstance,
) -> InstanceDocument {
    let mut doc = json!({
        "id": instance.object_id,
        "classId": instance.class_id,
        "state": instance.status.remote_state(),
    });
    if !instance.holder_email.is_empty() {
        set_path(
            &mut doc,
            "accountId",
            Value::String(instance.holder_email.clone()),
        );
    }
    set_path(
        &mut doc,
        holder_name_key(instance.class_type()),
        Value::String(instance.holder_name.clone()),
    );
    write_details(&mut doc, &instance.details);

    if !instance.text_modules.is_empty() {
        let modules = instance.text_modules.iter().map(text_module_value).collect();
        set_path(&mut doc, "textModulesData", Value::Array(modules));
    }
    if !instance.messages.is_empty() {
        let messages = instance.messages.iter().map(message_value).collect();
        set_path(&mut doc, "messages", Value::Array(messages));
    }
    set_path(&mut doc, "classReference", synthesize_class_document(template));

    InstanceDocument {
        document: doc,
        legacy: legacy_view(template, instance),
    }
}

/// Maps a provider object document onto an instance of `class_type`.
///
/// Identifiers lose any numeric issuer prefix. The result is `Pending`; the
/// caller decides the sync state after persisting.
pub fn parse_instance_document(doc: &Value, class_type: ClassType) -> DocumentResult<PassInstance> {
    if !doc.is_object() {
        return Err(DocumentError::NotAnObject);
    }
    let id = get_str(doc, "id").ok_or(DocumentError::MissingField("id"))?;
    let class_id = get_str(doc, "classId").ok_or(DocumentError::MissingField("classId"))?;

    let holder_name = match get_path(doc, holder_name_key(class_type)) {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    };

    Ok(PassInstance {
        object_id: strip_issuer_prefix(id).to_string(),
        class_id: strip_issuer_prefix(class_id).to_string(),
        holder_name,
        holder_email: get_string(doc, "accountId").unwrap_or_default(),
        status: InstanceStatus::from_remote_state(get_str(doc, "state")),
        sync_status: SyncStatus::Pending,
        last_synced_at: None,
        details: read_details(doc, class_type),
        text_modules: read_array(doc, "textModulesData")
            .map(|item| TextModule {
                id: item_id(item),
                header: get_string(item, "header"),
                body: get_string(item, "body"),
            })
            .collect(),
        messages: read_array(doc, "messages")
            .map(|item| PassMessage {
                id: item_id(item),
                header: get_string(item, "header"),
                body: get_string(item, "body"),
                message_type: get_string(item, "messageType"),
                display_start: get_string(item, "displayInterval.start.date"),
                display_end: get_string(item, "displayInterval.end.date"),
            })
            .collect(),
    })
}

fn holder_name_key(class_type: ClassType) -> &'static str {
    match class_type {
        ClassType::EventTicket => "ticketHolderName",
        ClassType::Transit => "passengerNames",
        ClassType::Generic | ClassType::Loyalty | ClassType::GiftCard => "accountName",
    }
}

fn write_details(doc: &mut Value, details: &InstanceDetails) {
    match details {
        InstanceDetails::Generic(details) => {
            set_localized(doc, "header", details.header_value.as_deref());
            set_localized(doc, "subheader", details.subheader_value.as_deref());
        }
        InstanceDetails::EventTicket(details) => {
            set_opt(
                doc,
                "reservationInfo.confirmationCode",
                details.confirmation_code.as_deref(),
            );
            set_localized(doc, "seatInfo.seat", details.seat_number.as_deref());
            set_localized(doc, "seatInfo.section", details.section.as_deref());
            set_localized(doc, "seatInfo.row", details.row_label.as_deref());
            set_localized(doc, "seatInfo.gate", details.gate.as_deref());
        }
        InstanceDetails::Loyalty(details) => {
            if let Some(member_id) = details.member_id.as_deref() {
                set_path(doc, "barcode", json!({ "type": "QR_CODE", "value": member_id }));
            }
            if let Some(points) = details.points {
                set_path(doc, "loyaltyPoints.balance.int", json!(points));
            }
            set_opt(doc, "loyaltyPoints.label", details.tier.as_deref());
        }
        InstanceDetails::GiftCard(details) => {
            set_opt(doc, "cardNumber", details.card_number.as_deref());
            set_opt(doc, "balance.amount", details.balance.as_deref());
            set_opt(doc, "validTimeInterval.end.date", details.expiry_date.as_deref());
        }
        InstanceDetails::Transit(details) => {
            set_opt(doc, "ticketNumber", details.ticket_number.as_deref());
            set_localized(doc, "ticketLeg.fareName", details.zone.as_deref());
            set_opt(doc, "validTimeInterval.start.date", details.valid_from.as_deref());
            set_opt(doc, "validTimeInterval.end.date", details.valid_until.as_deref());
        }
    }
}

fn read_details(doc: &Value, class_type: ClassType) -> InstanceDetails {
    match class_type {
        ClassType::Generic => InstanceDetails::Generic(GenericInstanceDetails {
            header_value: localized_value(doc, "header"),
            subheader_value: localized_value(doc, "subheader"),
        }),
        ClassType::EventTicket => InstanceDetails::EventTicket(EventTicketInstanceDetails {
            confirmation_code: get_string(doc, "reservationInfo.confirmationCode"),
            seat_number: localized_value(doc, "seatInfo.seat"),
            section: localized_value(doc, "seatInfo.section"),
            row_label: localized_value(doc, "seatInfo.row"),
            gate: localized_value(doc, "seatInfo.gate"),
        }),
        ClassType::Loyalty => InstanceDetails::Loyalty(LoyaltyInstanceDetails {
            member_id: get_string(doc, "barcode.value"),
            points: get_path(doc, "loyaltyPoints.balance.int").and_then(Value::as_i64),
            tier: get_string(doc, "loyaltyPoints.label"),
        }),
        ClassType::GiftCard => InstanceDetails::GiftCard(GiftCardInstanceDetails {
            card_number: get_string(doc, "cardNumber"),
            balance: get_string(doc, "balance.amount"),
            expiry_date: get_string(doc, "validTimeInterval.end.date"),
        }),
        ClassType::Transit => InstanceDetails::Transit(TransitInstanceDetails {
            ticket_number: get_string(doc, "ticketNumber"),
            zone: localized_value(doc, "ticketLeg.fareName"),
            valid_from: get_string(doc, "validTimeInterval.start.date"),
            valid_until: get_string(doc, "validTimeInterval.end.date"),
        }),
    }
}

fn text_module_value(module: &TextModule) -> Value {
    let mut value = json!({ "id": module.id });
    set_opt(&mut value, "header", module.header.as_deref());
    set_opt(&mut value, "body", module.body.as_deref());
    value
}

fn message_value(message: &PassMessage) -> Value {
    let mut value = json!({ "id": message.id });
    set_opt(&mut value, "header", message.header.as_deref());
    set_opt(&mut value, "body", message.body.as_deref());
    set_opt(&mut value, "messageType", message.message_type.as_deref());
    set_opt(
        &mut value,
        "displayInterval.start.date",
        message.display_start.as_deref(),
    );
    set_opt(
        &mut value,
        "displayInterval.end.date",
        message.display_end.as_deref(),
    );
    value
}

fn read_array<'a>(doc: &'a Value, path: &str) -> impl Iterator<Item = &'a Value> {
    get_path(doc, path)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|item| item.is_object())
}

fn item_id(item: &Value) -> String {
    get_string(item, "id").unwrap_or_else(|| Uuid::new_v4().simple().to_string())
}

fn legacy_view(template: &PassTemplate, instance: &PassInstance) -> Map<String, Value> {
    let mut legacy = Map::new();
    legacy.insert("class_id".to_string(), json!(template.class_id));
    legacy.insert(
        "class_type".to_string(),
        json!(template.class_type().as_str()),
    );
    for (key, value) in [
        ("issuer_name", template.issuer_name.as_deref()),
        ("base_color", template.base_color.as_deref()),
        ("logo_url", template.logo_url.as_deref()),
        ("hero_image_url", template.hero_image_url.as_deref()),
    ] {
        if let Some(value) = value {
            legacy.insert(key.to_string(), json!(value));
        }
    }
    merge_flat(&mut legacy, &template.details);

    legacy.insert("object_id".to_string(), json!(instance.object_id));
    legacy.insert("holder_name".to_string(), json!(instance.holder_name));
    legacy.insert("holder_email".to_string(), json!(instance.holder_email));
    legacy.insert("status".to_string(), json!(instance.status.as_str()));
    merge_flat(&mut legacy, &instance.details);

    for module in &instance.text_modules {
        let key = module.header.clone().unwrap_or_else(|| module.id.clone());
        legacy.insert(key, json!(module.body));
    }
    for message in &instance.messages {
        legacy.insert(format!("message:{}", message.id), json!(message.body));
    }
    legacy
}

/// Copies the non-null fields of a tagged details record, minus its tag.
fn merge_flat<T: Serialize>(legacy: &mut Map<String, Value>, details: &T) {
    if let Ok(Value::Object(fields)) = serde_json::to_value(details) {
        for (key, value) in fields {
            if key != "class_type" && !value.is_null() {
                legacy.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_instance_document, synthesize_instance_document};
    use crate::model::instance::{
        EventTicketInstanceDetails, InstanceDetails, InstanceStatus, LoyaltyInstanceDetails,
        PassInstance, PassMessage, TextModule,
    };
    use crate::model::template::{
        ClassType, EventTicketDetails, LoyaltyDetails, PassTemplate, TemplateDetails,
    };
    use serde_json::json;

    fn event_template(venue: &str) -> PassTemplate {
        PassTemplate::new(
            "EVT1",
            TemplateDetails::EventTicket(EventTicketDetails {
                event_name: "Cup Final".to_string(),
                venue_name: Some(venue.to_string()),
                venue_address: None,
                event_start: None,
            }),
        )
    }

    fn event_instance() -> PassInstance {
        let mut instance = PassInstance::new(
            "P1",
            "EVT1",
            "Jane Doe",
            "jane@example.com",
            InstanceDetails::EventTicket(EventTicketInstanceDetails {
                confirmation_code: Some("ABC123".to_string()),
                seat_number: Some("12".to_string()),
                section: Some("B".to_string()),
                row_label: None,
                gate: Some("4".to_string()),
            }),
        );
        instance.text_modules = vec![TextModule {
            id: "tm1".to_string(),
            header: Some("Doors".to_string()),
            body: Some("18:00".to_string()),
        }];
        instance.messages = vec![PassMessage {
            id: "m1".to_string(),
            header: Some("Welcome".to_string()),
            body: Some("Enjoy the show".to_string()),
            message_type: Some("TEXT".to_string()),
            display_start: Some("2026-06-01".to_string()),
            display_end: None,
        }];
        instance
    }

    #[test]
    fn event_ticket_document_maps_holder_seat_and_collections() {
        let synthesized = synthesize_instance_document(&event_template("Hall A"), &event_instance());
        let doc = &synthesized.document;

        assert_eq!(doc["id"], "P1");
        assert_eq!(doc["classId"], "EVT1");
        assert_eq!(doc["state"], "ACTIVE");
        assert_eq!(doc["ticketHolderName"], "Jane Doe");
        assert_eq!(doc["accountId"], "jane@example.com");
        assert_eq!(doc["reservationInfo"]["confirmationCode"], "ABC123");
        assert_eq!(doc["seatInfo"]["seat"]["defaultValue"]["value"], "12");
        assert!(doc["seatInfo"].get("row").is_none());
        assert_eq!(
            doc["textModulesData"],
            json!([{ "id": "tm1", "header": "Doors", "body": "18:00" }])
        );
        assert_eq!(doc["messages"][0]["displayInterval"]["start"]["date"], "2026-06-01");
        assert_eq!(
            doc["classReference"]["venue"]["name"]["defaultValue"]["value"],
            "Hall A"
        );
    }

    #[test]
    fn legacy_view_flattens_template_and_instance_fields() {
        let synthesized = synthesize_instance_document(&event_template("Hall B"), &event_instance());
        let legacy = &synthesized.legacy;

        assert_eq!(legacy["venue_name"], "Hall B");
        assert_eq!(legacy["event_name"], "Cup Final");
        assert_eq!(legacy["seat_number"], "12");
        assert_eq!(legacy["class_type"], "event_ticket");
        assert_eq!(legacy["Doors"], "18:00");
        assert_eq!(legacy["message:m1"], "Enjoy the show");
        assert!(!legacy.contains_key("row_label"));
    }

    #[test]
    fn parse_inverts_synthesis_for_instance_fields() {
        let original = event_instance();
        let synthesized = synthesize_instance_document(&event_template("Hall A"), &original);
        let parsed = parse_instance_document(&synthesized.document, ClassType::EventTicket)
            .expect("parse synthesized instance");
        assert_eq!(parsed, original);
    }

    #[test]
    fn loyalty_points_stay_integers() {
        let template = PassTemplate::new(
            "LOY1",
            TemplateDetails::Loyalty(LoyaltyDetails {
                program_name: "Rewards".to_string(),
            }),
        );
        let instance = PassInstance::new(
            "M1",
            "LOY1",
            "Sam",
            "sam@example.com",
            InstanceDetails::Loyalty(LoyaltyInstanceDetails {
                member_id: Some("MEM-9".to_string()),
                points: Some(1200),
                tier: Some("Gold".to_string()),
            }),
        );
        let doc = synthesize_instance_document(&template, &instance).document;
        assert_eq!(doc["accountName"], "Sam");
        assert_eq!(doc["loyaltyPoints"]["balance"]["int"], json!(1200));
        assert_eq!(doc["barcode"]["value"], "MEM-9");
    }

    #[test]
    fn parse_strips_prefixes_and_maps_state() {
        let doc = json!({
            "id": "3388000000012345.P7",
            "classId": "3388000000012345.EVT1",
            "state": "EXPIRED",
            "ticketHolderName": "Jane",
            "accountId": "jane@example.com",
            "textModulesData": [ { "header": "No id", "body": "generated" } ]
        });
        let parsed = parse_instance_document(&doc, ClassType::EventTicket).unwrap();
        assert_eq!(parsed.object_id, "P7");
        assert_eq!(parsed.class_id, "EVT1");
        assert_eq!(parsed.status, InstanceStatus::Expired);
        assert_eq!(parsed.text_modules.len(), 1);
        assert!(!parsed.text_modules[0].id.is_empty());
    }
}
