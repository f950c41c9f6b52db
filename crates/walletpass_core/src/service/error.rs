//! Use-case error taxonomy.

use crate::document::DocumentError;
use crate::gateway::{GatewayError, ResolveError, ResourceKind};
use crate::model::validation::ModelValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Aggregate of per-target failures from a fan-out or bulk pull.
///
/// Not fatal by itself; callers inspect it next to the successful count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSyncError {
    pub failed_count: usize,
    pub total_count: usize,
    pub errors: Vec<String>,
}

impl Display for PartialSyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} remote pushes failed",
            self.failed_count, self.total_count
        )?;
        if let Some(first) = self.errors.first() {
            write!(f, "; first error: {first}")?;
        }
        Ok(())
    }
}

impl Error for PartialSyncError {}

#[derive(Debug)]
pub enum ServiceError {
    /// Entity absent locally.
    NotFound { entity: &'static str, id: String },
    /// Entity absent remotely after probing every candidate.
    RemoteNotFound { id: String, candidates: Vec<String> },
    /// Duplicate business key.
    Conflict { entity: &'static str, id: String },
    Validation(ModelValidationError),
    /// Remote document could not be mapped.
    InvalidDocument(DocumentError),
    /// Remote resource family has no local representation.
    UnsupportedResource(ResourceKind),
    /// An operation requiring the remote provider ran without one.
    GatewayUnavailable,
    /// Fatal, non-continuable provider fault.
    RemoteGateway(GatewayError),
    PartialSync(PartialSyncError),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::RemoteNotFound { id, candidates } => write!(
                f,
                "remote record `{id}` not found; tried [{}]",
                candidates.join(", ")
            ),
            Self::Conflict { entity, id } => write!(f, "{entity} already exists: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidDocument(err) => write!(f, "{err}"),
            Self::UnsupportedResource(kind) => {
                write!(f, "remote resource kind {kind} is not stored locally")
            }
            Self::GatewayUnavailable => write!(f, "remote gateway is not configured"),
            Self::RemoteGateway(err) => write!(f, "{err}"),
            Self::PartialSync(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidDocument(err) => Some(err),
            Self::RemoteGateway(err) => Some(err),
            Self::PartialSync(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict { entity, id } => Self::Conflict { entity, id },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ModelValidationError> for ServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DocumentError> for ServiceError {
    fn from(value: DocumentError) -> Self {
        Self::InvalidDocument(value)
    }
}

impl From<GatewayError> for ServiceError {
    fn from(value: GatewayError) -> Self {
        Self::RemoteGateway(value)
    }
}

impl From<ResolveError> for ServiceError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::NotFound {
                raw_id, candidates, ..
            } => Self::RemoteNotFound {
                id: raw_id,
                candidates,
            },
            ResolveError::Fatal(err) => Self::RemoteGateway(err),
        }
    }
}

impl From<PartialSyncError> for ServiceError {
    fn from(value: PartialSyncError) -> Self {
        Self::PartialSync(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{PartialSyncError, ServiceError};
    use crate::gateway::{ResolveError, ResourceKind, PassFamily};
    use crate::repo::RepoError;

    #[test]
    fn repo_errors_map_onto_taxonomy() {
        let err: ServiceError = RepoError::NotFound {
            entity: "template",
            id: "EVT1".to_string(),
        }
        .into();
        assert!(matches!(err, ServiceError::NotFound { entity: "template", .. }));

        let err: ServiceError = RepoError::InvalidData("bad".to_string()).into();
        assert!(matches!(err, ServiceError::Repo(_)));
    }

    #[test]
    fn remote_not_found_keeps_every_candidate() {
        let err: ServiceError = ResolveError::NotFound {
            raw_id: "X".to_string(),
            candidates: vec!["P.X".to_string(), "X".to_string()],
            kinds: vec![ResourceKind::class(PassFamily::Generic)],
        }
        .into();
        assert_eq!(err.to_string(), "remote record `X` not found; tried [P.X, X]");
    }

    #[test]
    fn partial_sync_message_summarizes_counts() {
        let err = PartialSyncError {
            failed_count: 1,
            total_count: 3,
            errors: vec!["P2: remote error (500): boom".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "1 of 3 remote pushes failed; first error: P2: remote error (500): boom"
        );
    }
}
