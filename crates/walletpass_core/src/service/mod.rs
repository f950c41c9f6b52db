//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and gateway calls into use-case level APIs.
//! - Apply the local-first policy: a committed local write is never undone
//!   by a later remote failure.
//!
//! # Invariants
//! - Remote calls happen only after the local transaction committed.
//! - Remote failures after a local write surface as warnings or per-target
//!   results, never as the operation's error.

use crate::document::{synthesize_class_document, synthesize_instance_document};
use crate::gateway::{GatewayResult, IdentifierResolver, PassFamily, ResourceKind, UpsertAction};
use crate::model::instance::PassInstance;
use crate::model::template::PassTemplate;

pub mod error;
pub mod import_service;
pub mod instance_service;
pub mod template_service;

pub use error::{PartialSyncError, ServiceError, ServiceResult};

pub(crate) fn push_template(
    resolver: &IdentifierResolver,
    template: &PassTemplate,
) -> GatewayResult<UpsertAction> {
    let kind = ResourceKind::class(PassFamily::for_class_type(template.class_type()));
    resolver.upsert(kind, &synthesize_class_document(template))
}

pub(crate) fn push_instance(
    resolver: &IdentifierResolver,
    template: &PassTemplate,
    instance: &PassInstance,
) -> GatewayResult<UpsertAction> {
    let kind = ResourceKind::object(PassFamily::for_class_type(instance.class_type()));
    let synthesized = synthesize_instance_document(template, instance);
    resolver.upsert(kind, &synthesized.document)
}
