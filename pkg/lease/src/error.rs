use thiserror::Error;
use uuid::Uuid;

pub type LeaseResult<T> = Result<T, LeaseError>;

/// Outcomes of lease and registry operations other than success.
///
/// Everything but `StoreUnavailable` is an expected, caller-visible answer
/// and is never retried internally.
#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("resource {0} not found")]
    ResourceNotFound(Uuid),

    #[error("no lease found for resource {0}")]
    LockNotFound(Uuid),

    #[error("resource {resource_id} is held by another owner")]
    LockConflict { resource_id: Uuid, holder: String },

    #[error("lease on resource {resource_id} is owned by a different owner")]
    OwnerMismatch { resource_id: Uuid },

    #[error("resource {kind}/{identifier} already exists")]
    ResourceExists { kind: String, identifier: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connectivity or transaction failure; the caller may retry.
    #[error("lease store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),
}

impl LeaseError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LeaseError::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            LeaseError::LockNotFound(_) => "LOCK_NOT_FOUND",
            LeaseError::LockConflict { .. } => "LOCK_CONFLICT",
            LeaseError::OwnerMismatch { .. } => "OWNER_MISMATCH",
            LeaseError::ResourceExists { .. } => "RESOURCE_EXISTS",
            LeaseError::InvalidRequest(_) => "INVALID_REQUEST",
            LeaseError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, LeaseError::StoreUnavailable(_))
    }
}

impl From<anyhow::Error> for LeaseError {
    fn from(e: anyhow::Error) -> Self {
        LeaseError::StoreUnavailable(e)
    }
}
