use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pkg_lease::LeaseError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Error body returned for every non-success outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// HTTP face of a `LeaseError`.
#[derive(Debug)]
pub struct ApiError(pub LeaseError);

impl From<LeaseError> for ApiError {
    fn from(e: LeaseError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(err: &LeaseError) -> StatusCode {
    match err {
        LeaseError::ResourceNotFound(_) | LeaseError::LockNotFound(_) => StatusCode::NOT_FOUND,
        LeaseError::LockConflict { .. } | LeaseError::ResourceExists { .. } => {
            StatusCode::CONFLICT
        }
        LeaseError::OwnerMismatch { .. } => StatusCode::FORBIDDEN,
        LeaseError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        LeaseError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if self.0.is_transient() {
            warn!("Store failure while serving request: {}", self.0);
        } else {
            debug!("Request refused: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
