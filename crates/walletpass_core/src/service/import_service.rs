//! Remote-to-local reconciliation.
//!
//! # Responsibility
//! - Materialize remote templates and instances locally by business key.
//! - Heal a missing local template before importing an instance of it.
//! - Bulk-pull every stored family and verify single remote passes.
//!
//! # Invariants
//! - Review-status metadata is stripped before anything is parsed or stored.
//! - Imports are idempotent: repeating one yields `Upserted::Updated`.
//! - In bulk pulls one record's failure is counted, never fatal.

use super::error::{PartialSyncError, ServiceError, ServiceResult};
use crate::document::tree::{get_str, strip_review_status};
use crate::document::{parse_instance_document, parse_provider_document, DocumentError};
use crate::gateway::{
    IdentifierResolver, ListFilter, ResourceKind, Resolved, INSTANCE_PROBE_ORDER,
    TEMPLATE_PROBE_ORDER,
};
use crate::model::instance::PassInstance;
use crate::model::template::PassTemplate;
use crate::repo::instance_repo::InstanceRepository;
use crate::repo::template_repo::TemplateRepository;
use crate::repo::Upserted;
use log::{info, warn};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTemplate {
    pub template: PassTemplate,
    pub action: Upserted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedInstance {
    pub instance: PassInstance,
    pub action: Upserted,
    /// The referenced template was fetched remotely first.
    pub healed_template: bool,
}

/// Counters of one bulk pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub imported_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    pub errors: Vec<String>,
}

impl PullReport {
    pub fn partial_failure(&self) -> Option<PartialSyncError> {
        (self.failed_count > 0).then(|| PartialSyncError {
            failed_count: self.failed_count,
            total_count: self.total_count,
            errors: self.errors.clone(),
        })
    }

    fn record(&mut self, id: &str, result: ServiceResult<()>) {
        self.total_count += 1;
        match result {
            Ok(()) => self.imported_count += 1,
            Err(err) => {
                self.failed_count += 1;
                self.errors.push(format!("{id}: {err}"));
            }
        }
    }
}

/// Remote object plus the class it references.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteVerification {
    pub object: Resolved,
    pub class: Resolved,
}

pub struct ImportService<T: TemplateRepository, I: InstanceRepository> {
    templates: T,
    instances: I,
    resolver: IdentifierResolver,
}

impl<T: TemplateRepository, I: InstanceRepository> ImportService<T, I> {
    pub fn new(templates: T, instances: I, resolver: IdentifierResolver) -> Self {
        Self {
            templates,
            instances,
            resolver,
        }
    }

    /// Resolves a remote template by raw or qualified id and upserts it.
    pub fn import_template(&self, raw_id: &str) -> ServiceResult<ImportedTemplate> {
        let resolved = self.resolver.resolve_template(raw_id)?;
        if resolved.kind.family.class_type().is_none() {
            return Err(ServiceError::UnsupportedResource(resolved.kind));
        }
        self.store_template(&resolved.document)
    }

    /// Upserts one remote instance document, healing its template if needed.
    pub fn import_instance(&self, document: &Value) -> ServiceResult<ImportedInstance> {
        let document = strip_review_status(document);
        let raw_class_id =
            get_str(&document, "classId").ok_or(DocumentError::MissingField("classId"))?;
        let class_id = self.resolver.strip_prefix(raw_class_id).to_string();

        let (class_type, healed_template) = match self.templates.get_template(&class_id)? {
            Some(template) => (template.class_type(), false),
            None => {
                info!("event=template_heal module=import status=start class_id={class_id}");
                let imported = self.import_template(raw_class_id)?;
                (imported.template.class_type(), true)
            }
        };

        let mut instance = parse_instance_document(&document, class_type)?;
        let raw_object_id = get_str(&document, "id").ok_or(DocumentError::MissingField("id"))?;
        instance.object_id = self.resolver.strip_prefix(raw_object_id).to_string();
        instance.class_id = class_id;

        let action = self.instances.upsert_instance(&instance)?;
        self.instances.mark_synced(&instance.object_id)?;
        info!(
            "event=instance_import module=import status=ok object_id={} healed_template={healed_template}",
            instance.object_id
        );

        let instance = self
            .instances
            .get_instance(&instance.object_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "instance",
                id: instance.object_id.clone(),
            })?;
        Ok(ImportedInstance {
            instance,
            action,
            healed_template,
        })
    }

    /// Resolves a remote instance by raw or qualified id and imports it.
    pub fn import_instance_by_id(&self, raw_id: &str) -> ServiceResult<ImportedInstance> {
        let resolved = self.resolver.resolve_instance(raw_id)?;
        self.import_instance(&resolved.document)
    }

    /// Lists every stored template family remotely and upserts each class.
    pub fn pull_all_templates(&self) -> ServiceResult<PullReport> {
        let mut report = PullReport::default();
        for family in TEMPLATE_PROBE_ORDER {
            if family.class_type().is_none() {
                continue;
            }
            for document in self.list_kind(ResourceKind::class(family))? {
                let id = get_str(&document, "id").unwrap_or("<missing id>").to_string();
                report.record(&id, self.store_template(&document).map(|_| ()));
            }
        }
        self.log_pull("templates", &report);
        Ok(report)
    }

    /// Lists every object family remotely and imports each instance.
    pub fn pull_all_instances(&self) -> ServiceResult<PullReport> {
        let mut report = PullReport::default();
        for family in INSTANCE_PROBE_ORDER {
            for document in self.list_kind(ResourceKind::object(family))? {
                let id = get_str(&document, "id").unwrap_or("<missing id>").to_string();
                report.record(&id, self.import_instance(&document).map(|_| ()));
            }
        }
        self.log_pull("instances", &report);
        Ok(report)
    }

    /// Fetches a remote pass and the class it points at, without storing.
    pub fn verify_remote_instance(&self, raw_id: &str) -> ServiceResult<RemoteVerification> {
        let object = self.resolver.resolve_instance(raw_id)?;
        let class_id = get_str(&object.document, "classId")
            .ok_or(DocumentError::MissingField("classId"))?
            .to_string();
        let class = self.resolver.resolve_template(&class_id)?;
        Ok(RemoteVerification { object, class })
    }

    fn store_template(&self, document: &Value) -> ServiceResult<ImportedTemplate> {
        let document = strip_review_status(document);
        let mut template = parse_provider_document(&document)?;
        if let Some(raw_id) = get_str(&document, "id") {
            template.class_id = self.resolver.strip_prefix(raw_id).to_string();
        }

        let action = self.templates.upsert_template(&template)?;
        info!(
            "event=template_import module=import status=ok class_id={} class_type={}",
            template.class_id,
            template.class_type()
        );
        let template = self
            .templates
            .get_template(&template.class_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "template",
                id: template.class_id.clone(),
            })?;
        Ok(ImportedTemplate { template, action })
    }

    /// Lists one kind; a non-fatal error means the kind has nothing to list.
    fn list_kind(&self, kind: ResourceKind) -> ServiceResult<Vec<Value>> {
        match self.resolver.gateway().list(kind, &ListFilter::default()) {
            Ok(documents) => Ok(documents),
            Err(err) if err.is_non_fatal() => Ok(Vec::new()),
            Err(err) => {
                warn!("event=remote_list module=import status=error kind={kind} error={err}");
                Err(ServiceError::RemoteGateway(err))
            }
        }
    }

    fn log_pull(&self, what: &str, report: &PullReport) {
        info!(
            "event=remote_pull module=import status=ok target={what} total={} imported={} failed={}",
            report.total_count, report.imported_count, report.failed_count
        );
    }
}
