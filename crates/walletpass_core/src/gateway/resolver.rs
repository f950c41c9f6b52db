//! Identifier qualification and multi-kind probing.

use super::{
    GatewayError, GatewayErrorKind, GatewayResult, PassFamily, PassGateway, ResourceKind,
    ResourceLevel, INSTANCE_PROBE_ORDER, TEMPLATE_PROBE_ORDER,
};
use crate::document::class_doc::strip_issuer_prefix;
use crate::document::tree::{get_str, set_path, strip_review_status};
use log::{debug, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Result of one probe against one resource kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome<T> {
    Found(T),
    /// Non-fatal miss; the caller advances to the next probe.
    NotFound,
    Fatal(GatewayError),
}

impl<T> From<GatewayResult<T>> for ProbeOutcome<T> {
    fn from(result: GatewayResult<T>) -> Self {
        match result {
            Ok(value) => Self::Found(value),
            Err(err) if err.is_non_fatal() => Self::NotFound,
            Err(err) => Self::Fatal(err),
        }
    }
}

/// Runs `attempt` over `probes` in order and returns the first hit.
///
/// Misses advance, a fatal outcome stops immediately, and exhausting every
/// probe yields `Ok(None)`.
pub fn first_found<P, T, I, F>(probes: I, mut attempt: F) -> Result<Option<(P, T)>, GatewayError>
where
    I: IntoIterator<Item = P>,
    F: FnMut(&P) -> ProbeOutcome<T>,
{
    for probe in probes {
        match attempt(&probe) {
            ProbeOutcome::Found(value) => return Ok(Some((probe, value))),
            ProbeOutcome::NotFound => continue,
            ProbeOutcome::Fatal(err) => return Err(err),
        }
    }
    Ok(None)
}

/// Remote record located by probing.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub kind: ResourceKind,
    /// Candidate id that matched.
    pub id: String,
    pub document: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Every candidate/kind pair missed.
    NotFound {
        raw_id: String,
        candidates: Vec<String>,
        kinds: Vec<ResourceKind>,
    },
    /// A probe failed with a non-probing error.
    Fatal(GatewayError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound {
                raw_id,
                candidates,
                kinds,
            } => write!(
                f,
                "remote record `{raw_id}` not found; tried ids [{}] across {} resource kinds",
                candidates.join(", "),
                kinds.len()
            ),
            Self::Fatal(err) => write!(f, "remote lookup failed: {err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Fatal(err) => Some(err),
        }
    }
}

impl From<GatewayError> for ResolveError {
    fn from(value: GatewayError) -> Self {
        Self::Fatal(value)
    }
}

/// Remote write performed by [`IdentifierResolver::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    Patched,
}

/// Issuer-aware front for a [`PassGateway`].
#[derive(Clone)]
pub struct IdentifierResolver {
    gateway: Arc<dyn PassGateway>,
    issuer_id: String,
}

impl IdentifierResolver {
    pub fn new(gateway: Arc<dyn PassGateway>, issuer_id: impl Into<String>) -> Self {
        Self {
            gateway,
            issuer_id: issuer_id.into(),
        }
    }

    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    pub fn gateway(&self) -> &Arc<dyn PassGateway> {
        &self.gateway
    }

    /// Ids to probe for `raw_id`, prefixed form first.
    pub fn candidate_ids(&self, raw_id: &str) -> Vec<String> {
        if self.is_qualified(raw_id) {
            vec![raw_id.to_string()]
        } else {
            vec![format!("{}.{raw_id}", self.issuer_id), raw_id.to_string()]
        }
    }

    /// Fully qualified id for writes.
    pub fn qualify(&self, raw_id: &str) -> String {
        if self.is_qualified(raw_id) {
            raw_id.to_string()
        } else {
            format!("{}.{raw_id}", self.issuer_id)
        }
    }

    /// True for `<issuer>.<rest>`; a bare digit run that merely starts with the issuer is not.
    fn is_qualified(&self, raw_id: &str) -> bool {
        raw_id
            .strip_prefix(self.issuer_id.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Local id for a remote identifier.
    pub fn strip_prefix<'a>(&self, id: &'a str) -> &'a str {
        id.strip_prefix(self.issuer_id.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or_else(|| strip_issuer_prefix(id))
    }

    /// Probes every candidate id against every family, in that nesting order.
    pub fn resolve(
        &self,
        raw_id: &str,
        families: &[PassFamily],
        level: ResourceLevel,
    ) -> Result<Resolved, ResolveError> {
        let candidates = self.candidate_ids(raw_id);
        let kinds: Vec<ResourceKind> = families
            .iter()
            .map(|family| ResourceKind {
                family: *family,
                level,
            })
            .collect();

        let probes = candidates
            .iter()
            .flat_map(|candidate| kinds.iter().map(move |kind| (candidate.clone(), *kind)));
        let hit = first_found(probes, |(candidate, kind)| {
            debug!("event=remote_probe module=gateway status=start kind={kind} id={candidate}");
            ProbeOutcome::from(self.gateway.get(*kind, candidate))
        });

        match hit {
            Ok(Some(((candidate, kind), document))) => {
                debug!("event=remote_probe module=gateway status=found kind={kind} id={candidate}");
                Ok(Resolved {
                    kind,
                    id: candidate,
                    document,
                })
            }
            Ok(None) => {
                debug!(
                    "event=remote_resolve module=gateway status=not_found raw_id={raw_id} candidates={}",
                    candidates.len()
                );
                Err(ResolveError::NotFound {
                    raw_id: raw_id.to_string(),
                    candidates,
                    kinds,
                })
            }
            Err(err) => {
                warn!(
                    "event=remote_resolve module=gateway status=error raw_id={raw_id} error={err}"
                );
                Err(ResolveError::Fatal(err))
            }
        }
    }

    pub fn resolve_template(&self, raw_id: &str) -> Result<Resolved, ResolveError> {
        self.resolve(raw_id, &TEMPLATE_PROBE_ORDER, ResourceLevel::Class)
    }

    pub fn resolve_instance(&self, raw_id: &str) -> Result<Resolved, ResolveError> {
        self.resolve(raw_id, &INSTANCE_PROBE_ORDER, ResourceLevel::Object)
    }

    /// Creates the resource, or patches it when it already exists.
    ///
    /// Identifiers inside `document` are qualified and review metadata is
    /// removed before sending.
    pub fn upsert(&self, kind: ResourceKind, document: &Value) -> GatewayResult<UpsertAction> {
        let outbound = self.qualify_document(kind, document)?;
        let id = get_str(&outbound, "id")
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::new(GatewayErrorKind::BadRequest, "document has no id")
            })?;

        match self.gateway.insert(kind, &outbound) {
            Ok(_) => {
                debug!("event=remote_upsert module=gateway status=inserted kind={kind} id={id}");
                Ok(UpsertAction::Inserted)
            }
            Err(err) if err.kind == GatewayErrorKind::Conflict => {
                self.gateway.patch(kind, &id, &outbound)?;
                debug!("event=remote_upsert module=gateway status=patched kind={kind} id={id}");
                Ok(UpsertAction::Patched)
            }
            Err(err) => Err(err),
        }
    }

    fn qualify_document(&self, kind: ResourceKind, document: &Value) -> GatewayResult<Value> {
        let mut outbound = strip_review_status(document);
        let id = get_str(&outbound, "id")
            .map(|id| self.qualify(id))
            .ok_or_else(|| GatewayError::new(GatewayErrorKind::BadRequest, "document has no id"))?;
        set_path(&mut outbound, "id", Value::String(id));

        if kind.level == ResourceLevel::Object {
            for path in ["classId", "classReference.id"] {
                if let Some(class_id) = get_str(&outbound, path).map(|id| self.qualify(id)) {
                    set_path(&mut outbound, path, Value::String(class_id));
                }
            }
        }
        Ok(outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::{first_found, IdentifierResolver, ProbeOutcome, ResolveError, UpsertAction};
    use crate::gateway::{
        GatewayError, GatewayResult, ListFilter, PassFamily, PassGateway, ResourceKind,
        ResourceLevel,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    const ISSUER: &str = "3388000000012345";

    /// Records every call and answers from a fixed script.
    #[derive(Default)]
    struct ScriptedGateway {
        calls: Mutex<Vec<String>>,
        found: Option<(ResourceKind, String)>,
        fail_with: Option<GatewayError>,
        existing: bool,
    }

    impl PassGateway for ScriptedGateway {
        fn get(&self, kind: ResourceKind, id: &str) -> GatewayResult<Value> {
            self.calls.lock().unwrap().push(format!("get {kind} {id}"));
            if let Some(err) = self.fail_with.clone() {
                return Err(err);
            }
            match &self.found {
                Some((found_kind, found_id)) if *found_kind == kind && found_id == id => {
                    Ok(json!({ "id": id }))
                }
                _ => Err(GatewayError::from_status(404, "missing")),
            }
        }

        fn insert(&self, kind: ResourceKind, document: &Value) -> GatewayResult<Value> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("insert {kind} {}", document["id"]));
            if self.existing {
                return Err(GatewayError::conflict("exists"));
            }
            Ok(document.clone())
        }

        fn patch(&self, kind: ResourceKind, id: &str, document: &Value) -> GatewayResult<Value> {
            self.calls.lock().unwrap().push(format!("patch {kind} {id}"));
            Ok(document.clone())
        }

        fn list(&self, _kind: ResourceKind, _filter: &ListFilter) -> GatewayResult<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    fn resolver(gateway: ScriptedGateway) -> (Arc<ScriptedGateway>, IdentifierResolver) {
        let gateway = Arc::new(gateway);
        let resolver = IdentifierResolver::new(gateway.clone(), ISSUER);
        (gateway, resolver)
    }

    #[test]
    fn candidate_ids_try_prefixed_form_first() {
        let (_, resolver) = resolver(ScriptedGateway::default());
        assert_eq!(
            resolver.candidate_ids("EVT1"),
            vec![format!("{ISSUER}.EVT1"), "EVT1".to_string()]
        );
        let qualified = format!("{ISSUER}.EVT1");
        assert_eq!(resolver.candidate_ids(&qualified), vec![qualified.clone()]);
        assert_eq!(resolver.qualify("EVT1"), qualified);
        assert_eq!(resolver.strip_prefix(&qualified), "EVT1");
        assert_eq!(resolver.strip_prefix("999.EVT1"), "EVT1");
    }

    #[test]
    fn issuer_digits_without_separator_are_not_qualified() {
        let (_, resolver) = resolver(ScriptedGateway::default());
        let glued = format!("{ISSUER}ABC");
        assert_eq!(
            resolver.candidate_ids(&glued),
            vec![format!("{ISSUER}.{glued}"), glued.clone()]
        );
        assert_eq!(resolver.qualify(&glued), format!("{ISSUER}.{glued}"));
    }

    #[test]
    fn resolve_finds_raw_id_after_exhausting_prefixed_candidates() {
        let (gateway, resolver) = resolver(ScriptedGateway {
            found: Some((ResourceKind::class(PassFamily::Loyalty), "LOY1".to_string())),
            ..ScriptedGateway::default()
        });

        let resolved = resolver.resolve_template("LOY1").unwrap();
        assert_eq!(resolved.kind, ResourceKind::class(PassFamily::Loyalty));
        assert_eq!(resolved.id, "LOY1");
        // 7 kinds for the prefixed candidate, then generic + loyalty for the raw one.
        assert_eq!(gateway.calls.lock().unwrap().len(), 9);
    }

    #[test]
    fn exhausted_probes_report_every_candidate() {
        let (gateway, resolver) = resolver(ScriptedGateway::default());
        let err = resolver.resolve_instance("P1").unwrap_err();

        match &err {
            ResolveError::NotFound {
                candidates, kinds, ..
            } => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(kinds.len(), 5);
                assert!(kinds.iter().all(|kind| kind.level == ResourceLevel::Object));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains(&format!("{ISSUER}.P1")));
        assert!(message.contains("P1"));
        assert_eq!(gateway.calls.lock().unwrap().len(), 10);
    }

    #[test]
    fn fatal_error_aborts_on_first_probe() {
        let (gateway, resolver) = resolver(ScriptedGateway {
            fail_with: Some(GatewayError::from_status(403, "forbidden")),
            ..ScriptedGateway::default()
        });
        let err = resolver.resolve_template("EVT1").unwrap_err();
        assert!(matches!(err, ResolveError::Fatal(ref inner) if inner.status == Some(403)));
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn bad_request_is_non_fatal() {
        let outcome: ProbeOutcome<()> =
            ProbeOutcome::from(Err(GatewayError::from_status(400, "bad id")));
        assert_eq!(outcome, ProbeOutcome::NotFound);
    }

    #[test]
    fn first_found_returns_none_when_all_miss() {
        let hit = first_found([1, 2, 3], |_| ProbeOutcome::<()>::NotFound).unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn upsert_patches_on_conflict_with_qualified_ids_and_no_review_status() {
        let (gateway, resolver) = resolver(ScriptedGateway {
            existing: true,
            ..ScriptedGateway::default()
        });
        let kind = ResourceKind::object(PassFamily::EventTicket);
        let action = resolver
            .upsert(
                kind,
                &json!({ "id": "P1", "classId": "EVT1", "reviewStatus": "DRAFT" }),
            )
            .unwrap();

        assert_eq!(action, UpsertAction::Patched);
        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls[0], format!("insert eventTicketObject \"{ISSUER}.P1\""));
        assert_eq!(calls[1], format!("patch eventTicketObject {ISSUER}.P1"));
    }

    #[test]
    fn qualified_document_has_prefixed_class_reference() {
        let (_, resolver) = resolver(ScriptedGateway::default());
        let outbound = resolver
            .qualify_document(
                ResourceKind::object(PassFamily::Generic),
                &json!({ "id": "P1", "classId": "GEN1", "classReference": { "id": "GEN1" }, "reviewStatus": "x" }),
            )
            .unwrap();
        assert_eq!(outbound["classId"], format!("{ISSUER}.GEN1"));
        assert_eq!(outbound["classReference"]["id"], format!("{ISSUER}.GEN1"));
        assert!(outbound.get("reviewStatus").is_none());
    }
}
