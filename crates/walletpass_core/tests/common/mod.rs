#![allow(dead_code)]

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use walletpass_core::document::tree::get_str;
use walletpass_core::gateway::{
    GatewayError, GatewayResult, ListFilter, PassGateway, ResourceKind,
};
use walletpass_core::model::instance::{
    EventTicketInstanceDetails, InstanceDetails, PassInstance,
};
use walletpass_core::model::template::{EventTicketDetails, PassTemplate, TemplateDetails};
use walletpass_core::IdentifierResolver;

pub const ISSUER: &str = "3388000000022";

/// In-memory provider keyed by `(kind, qualified id)`.
#[derive(Default)]
pub struct FakeGateway {
    records: Mutex<BTreeMap<(String, String), Value>>,
    failing_ids: Mutex<BTreeSet<String>>,
    writes: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn resolver(self: &Arc<Self>) -> IdentifierResolver {
        IdentifierResolver::new(self.clone(), ISSUER)
    }

    /// Writes to `id` fail with a server error from now on.
    pub fn fail_writes_for(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn seed(&self, kind: ResourceKind, document: Value) {
        let id = get_str(&document, "id").expect("seeded document has id").to_string();
        self.records
            .lock()
            .unwrap()
            .insert((kind.to_string(), id), document);
    }

    pub fn stored(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.records
            .lock()
            .unwrap()
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
    }

    /// `insert:<kind>:<id>` / `patch:<kind>:<id>` in call order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn check_writable(&self, id: &str) -> GatewayResult<()> {
        if self.failing_ids.lock().unwrap().contains(id) {
            return Err(GatewayError::from_status(503, format!("backend unavailable for {id}")));
        }
        Ok(())
    }
}

impl PassGateway for FakeGateway {
    fn get(&self, kind: ResourceKind, id: &str) -> GatewayResult<Value> {
        self.stored(kind, id)
            .ok_or_else(|| GatewayError::from_status(404, format!("{kind} {id} not found")))
    }

    fn insert(&self, kind: ResourceKind, document: &Value) -> GatewayResult<Value> {
        let id = get_str(document, "id")
            .ok_or_else(|| GatewayError::from_status(400, "missing id"))?
            .to_string();
        self.check_writable(&id)?;
        let mut records = self.records.lock().unwrap();
        let key = (kind.to_string(), id.clone());
        if records.contains_key(&key) {
            return Err(GatewayError::from_status(409, format!("{kind} {id} exists")));
        }
        records.insert(key, document.clone());
        self.writes.lock().unwrap().push(format!("insert:{kind}:{id}"));
        Ok(document.clone())
    }

    fn patch(&self, kind: ResourceKind, id: &str, document: &Value) -> GatewayResult<Value> {
        self.check_writable(id)?;
        let mut records = self.records.lock().unwrap();
        let key = (kind.to_string(), id.to_string());
        if !records.contains_key(&key) {
            return Err(GatewayError::from_status(404, format!("{kind} {id} not found")));
        }
        records.insert(key, document.clone());
        self.writes.lock().unwrap().push(format!("patch:{kind}:{id}"));
        Ok(document.clone())
    }

    fn list(&self, kind: ResourceKind, filter: &ListFilter) -> GatewayResult<Vec<Value>> {
        let kind_name = kind.to_string();
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((stored_kind, _), _)| *stored_kind == kind_name)
            .map(|(_, document)| document)
            .filter(|document| match filter.class_id.as_deref() {
                Some(class_id) => get_str(document, "classId") == Some(class_id),
                None => true,
            })
            .cloned()
            .collect())
    }
}

pub fn event_template(class_id: &str, venue: &str) -> PassTemplate {
    let mut template = PassTemplate::new(
        class_id,
        TemplateDetails::EventTicket(EventTicketDetails {
            event_name: "Cup Final".to_string(),
            venue_name: Some(venue.to_string()),
            venue_address: None,
            event_start: Some("2026-11-01T19:30".to_string()),
        }),
    );
    template.issuer_name = Some("City Arena".to_string());
    template.base_color = Some("#1a73e8".to_string());
    template
}

pub fn event_instance(object_id: &str, class_id: &str, seat: &str) -> PassInstance {
    PassInstance::new(
        object_id,
        class_id,
        "Jane Holder",
        format!("{}@example.com", object_id.to_lowercase()),
        InstanceDetails::EventTicket(EventTicketInstanceDetails {
            seat_number: Some(seat.to_string()),
            section: Some("B".to_string()),
            ..EventTicketInstanceDetails::default()
        }),
    )
}
