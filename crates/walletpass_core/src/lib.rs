//! Core domain logic for wallet pass templates and their issued instances.
//! This crate is the single source of truth for sync and storage invariants.

pub mod config;
pub mod db;
pub mod document;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;

pub use config::{ConfigError, WalletConfig};
pub use db::{health_check, open_db, open_db_in_memory, DbError};
pub use gateway::{
    GatewayError, GatewayErrorKind, IdentifierResolver, ListFilter, PassFamily, PassGateway,
    ResourceKind, ResourceLevel,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::instance::{
    InstanceDetails, InstancePatch, InstanceStatus, ObjectId, PassInstance, PassMessage,
    SyncStatus, TextModule,
};
pub use model::notification::{NotificationRecord, NotificationStatus};
pub use model::template::{ClassId, ClassType, PassTemplate, TemplateDetails, TemplatePatch};
pub use model::validation::ModelValidationError;
pub use repo::instance_repo::{InstanceListQuery, InstanceRepository, SqliteInstanceRepository};
pub use repo::notification_repo::{NotificationLedger, SqliteNotificationLedger};
pub use repo::template_repo::{SqliteTemplateRepository, TemplateRepository};
pub use repo::{RepoError, RepoResult};
pub use service::import_service::ImportService;
pub use service::instance_service::InstanceService;
pub use service::template_service::{PropagationOutcome, TemplateService, TemplateUpdateOutcome};
pub use service::{PartialSyncError, ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
