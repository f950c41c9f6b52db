//! Template use-case service and update propagation.
//!
//! # Responsibility
//! - Provide template create/get/list/delete APIs.
//! - Run `update_template`: local write, remote template upsert, then a
//!   best-effort push of every dependent instance.
//!
//! # Invariants
//! - A failed local write aborts before any remote call.
//! - One instance's push failure never skips the remaining instances.
//! - Every attempted instance push appends exactly one ledger row.
//! - A failed ledger or bookkeeping write counts against that instance only.

use super::error::{PartialSyncError, ServiceError, ServiceResult};
use super::{push_instance, push_template};
use crate::document::{is_remote_shaped, synthesize_class_document};
use crate::gateway::{GatewayResult, IdentifierResolver, UpsertAction};
use crate::model::notification::{NewNotification, NotificationRecord};
use crate::model::template::{ClassType, PassTemplate, TemplatePatch};
use crate::repo::instance_repo::{InstanceListQuery, InstanceRepository};
use crate::repo::notification_repo::NotificationLedger;
use crate::repo::template_repo::TemplateRepository;
use crate::repo::RepoResult;
use log::{info, warn};
use std::time::Instant;

const SENT_MESSAGE: &str = "template update pushed to holder pass";

/// Why fan-out did not run after a successful local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationSkip {
    GatewayUnavailable,
    NoRemoteDocument,
}

impl PropagationSkip {
    pub fn reason(self) -> &'static str {
        match self {
            Self::GatewayUnavailable => "remote gateway not configured; saved locally only",
            Self::NoRemoteDocument => "template has no remote-shaped document; saved locally only",
        }
    }
}

/// Fan-out counters. `errors` holds one `object_id: message` entry per failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationOutcome {
    pub updated_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    pub errors: Vec<String>,
}

impl PropagationOutcome {
    /// Aggregate error when at least one push failed.
    pub fn partial_failure(&self) -> Option<PartialSyncError> {
        (self.failed_count > 0).then(|| PartialSyncError {
            failed_count: self.failed_count,
            total_count: self.total_count,
            errors: self.errors.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateUpdateOutcome {
    /// Stored template after the local write.
    pub template: PassTemplate,
    pub propagation: PropagationOutcome,
    pub skipped: Option<PropagationSkip>,
    /// Downgraded remote failures of the template push itself.
    pub warnings: Vec<String>,
}

/// Local write result plus downgraded remote failures.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateWriteOutcome {
    pub template: PassTemplate,
    pub warnings: Vec<String>,
}

/// Template service facade over repository implementations.
pub struct TemplateService<T, I, L>
where
    T: TemplateRepository,
    I: InstanceRepository,
    L: NotificationLedger,
{
    templates: T,
    instances: I,
    ledger: L,
    remote: Option<IdentifierResolver>,
}

impl<T, I, L> TemplateService<T, I, L>
where
    T: TemplateRepository,
    I: InstanceRepository,
    L: NotificationLedger,
{
    /// Creates a local-only service.
    pub fn new(templates: T, instances: I, ledger: L) -> Self {
        Self {
            templates,
            instances,
            ledger,
            remote: None,
        }
    }

    /// Enables remote pushes through `resolver`.
    pub fn with_remote(mut self, resolver: IdentifierResolver) -> Self {
        self.remote = Some(resolver);
        self
    }

    /// Persists a new template, then upserts it remotely when possible.
    pub fn create_template(&self, template: PassTemplate) -> ServiceResult<TemplateWriteOutcome> {
        self.templates.create_template(&template)?;
        info!(
            "event=template_create module=service status=ok class_id={} class_type={}",
            template.class_id,
            template.class_type()
        );

        let mut warnings = Vec::new();
        if let Some(resolver) = self.remote.as_ref() {
            if is_remote_shaped(&synthesize_class_document(&template)) {
                if let Err(err) = push_template(resolver, &template) {
                    warn!(
                        "event=template_push module=service status=error class_id={} error={err}",
                        template.class_id
                    );
                    warnings.push(format!("remote template push failed: {err}"));
                }
            }
        }

        let stored = self.get_template(&template.class_id)?;
        Ok(TemplateWriteOutcome {
            template: stored,
            warnings,
        })
    }

    pub fn get_template(&self, class_id: &str) -> ServiceResult<PassTemplate> {
        self.templates
            .get_template(class_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "template",
                id: class_id.to_string(),
            })
    }

    pub fn list_templates(&self, class_type: Option<ClassType>) -> ServiceResult<Vec<PassTemplate>> {
        Ok(self.templates.list_templates(class_type)?)
    }

    /// Deletes a template with its instances and ledger rows. Local only.
    pub fn delete_template(&self, class_id: &str) -> ServiceResult<()> {
        self.templates.delete_template(class_id)?;
        info!("event=template_delete module=service status=ok class_id={class_id}");
        Ok(())
    }

    /// Ledger rows for one template in insertion order.
    pub fn list_notifications(&self, class_id: &str) -> ServiceResult<Vec<NotificationRecord>> {
        Ok(self.ledger.list_for_template(class_id)?)
    }

    pub fn list_instance_notifications(
        &self,
        object_id: &str,
    ) -> ServiceResult<Vec<NotificationRecord>> {
        Ok(self.ledger.list_for_instance(object_id)?)
    }

    /// Applies `patch` locally and propagates the result.
    ///
    /// Returns `Err` only for local failures. Remote failures show up in
    /// `warnings` (template push) or `propagation` (instance pushes).
    pub fn update_template(
        &self,
        class_id: &str,
        patch: &TemplatePatch,
    ) -> ServiceResult<TemplateUpdateOutcome> {
        let started_at = Instant::now();
        self.templates.update_template(class_id, patch)?;
        let template = self.get_template(class_id)?;

        let mut outcome = TemplateUpdateOutcome {
            template,
            propagation: PropagationOutcome::default(),
            skipped: None,
            warnings: Vec::new(),
        };

        let Some(resolver) = self.remote.as_ref() else {
            outcome.skipped = Some(PropagationSkip::GatewayUnavailable);
            info!(
                "event=template_update module=service status=skipped class_id={class_id} reason=gateway_unavailable"
            );
            return Ok(outcome);
        };
        if !is_remote_shaped(&synthesize_class_document(&outcome.template)) {
            outcome.skipped = Some(PropagationSkip::NoRemoteDocument);
            info!(
                "event=template_update module=service status=skipped class_id={class_id} reason=no_remote_document"
            );
            return Ok(outcome);
        }

        if let Err(err) = push_template(resolver, &outcome.template) {
            warn!("event=template_push module=service status=error class_id={class_id} error={err}");
            outcome
                .warnings
                .push(format!("remote template push failed: {err}"));
        }

        outcome.propagation = self.fan_out(resolver, &outcome.template)?;
        let propagation = &outcome.propagation;
        info!(
            "event=template_update module=service status=ok class_id={class_id} total={} updated={} failed={} duration_ms={}",
            propagation.total_count,
            propagation.updated_count,
            propagation.failed_count,
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    fn fan_out(
        &self,
        resolver: &IdentifierResolver,
        template: &PassTemplate,
    ) -> ServiceResult<PropagationOutcome> {
        let instances = self
            .instances
            .list_instances(&InstanceListQuery::for_template(template.class_id.as_str()))?;
        let mut outcome = PropagationOutcome {
            total_count: instances.len(),
            ..PropagationOutcome::default()
        };

        for instance in &instances {
            let pushed = push_instance(resolver, template, instance);
            if let Err(err) = &pushed {
                warn!(
                    "event=instance_push module=service status=error class_id={} object_id={} error={err}",
                    template.class_id, instance.object_id
                );
            }
            let recorded = self.record_push(template, &instance.object_id, &pushed);
            if let Err(err) = &recorded {
                warn!(
                    "event=instance_bookkeeping module=service status=error class_id={} object_id={} error={err}",
                    template.class_id, instance.object_id
                );
            }
            match (pushed, recorded) {
                (Ok(_), Ok(())) => outcome.updated_count += 1,
                (Err(err), _) => {
                    outcome.failed_count += 1;
                    outcome.errors.push(format!("{}: {err}", instance.object_id));
                }
                (Ok(_), Err(err)) => {
                    outcome.failed_count += 1;
                    outcome
                        .errors
                        .push(format!("{}: local bookkeeping failed: {err}", instance.object_id));
                }
            }
        }
        Ok(outcome)
    }

    /// Ledger row plus sync bookkeeping for one push attempt.
    fn record_push(
        &self,
        template: &PassTemplate,
        object_id: &str,
        pushed: &GatewayResult<UpsertAction>,
    ) -> RepoResult<()> {
        match pushed {
            Ok(_) => {
                self.ledger.append(&NewNotification::sent(
                    &template.class_id,
                    object_id,
                    SENT_MESSAGE,
                ))?;
                self.instances.mark_synced(object_id)
            }
            Err(err) => {
                self.ledger.append(&NewNotification::failed(
                    &template.class_id,
                    object_id,
                    err.to_string(),
                ))?;
                self.instances.mark_sync_failed(object_id)
            }
        }
    }
}
