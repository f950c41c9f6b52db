//! Instance use-case service.
//!
//! # Responsibility
//! - Provide instance CRUD, holder/template listings and status updates.
//! - Push instance documents on request and record sync bookkeeping.
//!
//! # Invariants
//! - Optional sync on create/update is best-effort: the local write stands
//!   and the remote failure becomes a warning.
//! - Explicit re-push surfaces the remote failure as the operation's error.

use super::error::{ServiceError, ServiceResult};
use super::push_instance;
use crate::document::{synthesize_instance_document, InstanceDocument};
use crate::gateway::IdentifierResolver;
use crate::model::instance::{InstancePatch, InstanceStatus, PassInstance};
use crate::model::template::PassTemplate;
use crate::repo::instance_repo::{InstanceListQuery, InstanceRepository};
use crate::repo::template_repo::TemplateRepository;
use log::{info, warn};

/// Local write result plus downgraded remote failures.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceWriteOutcome {
    pub instance: PassInstance,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceWithTemplate {
    pub instance: PassInstance,
    pub template: PassTemplate,
}

/// Instance service facade over repository implementations.
pub struct InstanceService<T: TemplateRepository, I: InstanceRepository> {
    templates: T,
    instances: I,
    remote: Option<IdentifierResolver>,
}

impl<T: TemplateRepository, I: InstanceRepository> InstanceService<T, I> {
    pub fn new(templates: T, instances: I) -> Self {
        Self {
            templates,
            instances,
            remote: None,
        }
    }

    pub fn with_remote(mut self, resolver: IdentifierResolver) -> Self {
        self.remote = Some(resolver);
        self
    }

    /// Persists a new instance; pushes it when `sync` is set.
    pub fn create_instance(
        &self,
        instance: PassInstance,
        sync: bool,
    ) -> ServiceResult<InstanceWriteOutcome> {
        self.instances.create_instance(&instance)?;
        info!(
            "event=instance_create module=service status=ok object_id={} class_id={}",
            instance.object_id, instance.class_id
        );
        self.finish_write(&instance.object_id, sync)
    }

    pub fn get_instance(&self, object_id: &str) -> ServiceResult<PassInstance> {
        self.instances
            .get_instance(object_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "instance",
                id: object_id.to_string(),
            })
    }

    pub fn get_instance_with_template(&self, object_id: &str) -> ServiceResult<InstanceWithTemplate> {
        let instance = self.get_instance(object_id)?;
        let template = self.load_template(&instance.class_id)?;
        Ok(InstanceWithTemplate { instance, template })
    }

    /// Lists every instance, optionally of one status.
    pub fn list_instances(&self, status: Option<InstanceStatus>) -> ServiceResult<Vec<PassInstance>> {
        let query = InstanceListQuery {
            status,
            ..InstanceListQuery::default()
        };
        Ok(self.instances.list_instances(&query)?)
    }

    pub fn list_by_template(&self, class_id: &str) -> ServiceResult<Vec<PassInstance>> {
        if !self.templates.template_exists(class_id)? {
            return Err(ServiceError::NotFound {
                entity: "template",
                id: class_id.to_string(),
            });
        }
        Ok(self
            .instances
            .list_instances(&InstanceListQuery::for_template(class_id))?)
    }

    pub fn list_by_holder(&self, holder_email: &str) -> ServiceResult<Vec<PassInstance>> {
        Ok(self
            .instances
            .list_instances(&InstanceListQuery::for_holder(holder_email))?)
    }

    /// Applies a partial update; pushes the result when `sync` is set.
    pub fn update_instance(
        &self,
        object_id: &str,
        patch: &InstancePatch,
        sync: bool,
    ) -> ServiceResult<InstanceWriteOutcome> {
        self.instances.update_instance(object_id, patch)?;
        info!("event=instance_update module=service status=ok object_id={object_id}");
        self.finish_write(object_id, sync)
    }

    pub fn update_status(&self, object_id: &str, status: InstanceStatus) -> ServiceResult<PassInstance> {
        self.instances.update_status(object_id, status)?;
        info!(
            "event=instance_status module=service status=ok object_id={object_id} value={}",
            status.as_str()
        );
        self.get_instance(object_id)
    }

    /// Deletes locally only.
    pub fn delete_instance(&self, object_id: &str) -> ServiceResult<()> {
        self.instances.delete_instance(object_id)?;
        info!("event=instance_delete module=service status=ok object_id={object_id}");
        Ok(())
    }

    /// Pushes the stored instance again and returns its updated sync state.
    pub fn repush_instance(&self, object_id: &str) -> ServiceResult<PassInstance> {
        let resolver = self.remote.as_ref().ok_or(ServiceError::GatewayUnavailable)?;
        let InstanceWithTemplate { instance, template } = self.get_instance_with_template(object_id)?;

        match push_instance(resolver, &template, &instance) {
            Ok(_) => {
                self.instances.mark_synced(object_id)?;
                info!("event=instance_push module=service status=ok object_id={object_id}");
                self.get_instance(object_id)
            }
            Err(err) => {
                self.instances.mark_sync_failed(object_id)?;
                warn!("event=instance_push module=service status=error object_id={object_id} error={err}");
                Err(ServiceError::RemoteGateway(err))
            }
        }
    }

    /// Canonical document of the stored instance against its current template.
    pub fn document_for(&self, object_id: &str) -> ServiceResult<InstanceDocument> {
        let InstanceWithTemplate { instance, template } = self.get_instance_with_template(object_id)?;
        Ok(synthesize_instance_document(&template, &instance))
    }

    fn load_template(&self, class_id: &str) -> ServiceResult<PassTemplate> {
        self.templates
            .get_template(class_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "template",
                id: class_id.to_string(),
            })
    }

    fn finish_write(&self, object_id: &str, sync: bool) -> ServiceResult<InstanceWriteOutcome> {
        let mut warnings = Vec::new();
        if sync {
            match self.remote.as_ref() {
                None => warnings.push(ServiceError::GatewayUnavailable.to_string()),
                Some(resolver) => {
                    let InstanceWithTemplate { instance, template } =
                        self.get_instance_with_template(object_id)?;
                    match push_instance(resolver, &template, &instance) {
                        Ok(_) => self.instances.mark_synced(object_id)?,
                        Err(err) => {
                            warn!(
                                "event=instance_push module=service status=error object_id={object_id} error={err}"
                            );
                            self.instances.mark_sync_failed(object_id)?;
                            warnings.push(format!("remote instance push failed: {err}"));
                        }
                    }
                }
            }
        }

        Ok(InstanceWriteOutcome {
            instance: self.get_instance(object_id)?,
            warnings,
        })
    }
}
