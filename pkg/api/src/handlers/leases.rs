use axum::{
    Json,
    extract::State,
    response::IntoResponse,
};
use pkg_lease::LeaseError;
use pkg_types::lease::{AcquireRequest, HeartbeatRequest, MessageResponse, ReleaseRequest};
use tracing::debug;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};

/// POST /api/locks/acquire: take or refresh a lease.
pub async fn acquire(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AcquireRequest>,
) -> Result<impl IntoResponse, ApiError> {
    debug!(
        "Acquire request: resource={} owner={} ttl={}s",
        req.resource_id, req.owner_id, req.ttl_seconds
    );
    match state
        .leases
        .acquire(req.resource_id, &req.owner_id, req.ttl_seconds)
        .await
    {
        Ok(lease) => {
            state.metrics.acquired();
            Ok(Json(lease))
        }
        Err(e) => {
            if matches!(e, LeaseError::LockConflict { .. }) {
                state.metrics.conflicted();
            }
            Err(e.into())
        }
    }
}

/// POST /api/locks/release: give a lease up.
pub async fn release(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReleaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.leases.release(req.resource_id, &req.owner_id).await?;
    state.metrics.released();
    Ok(Json(MessageResponse {
        message: "Lock released".to_string(),
    }))
}

/// POST /api/locks/heartbeat: keep a held lease alive.
pub async fn heartbeat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<HeartbeatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.leases.heartbeat(req.resource_id, &req.owner_id).await?;
    state.metrics.heartbeat();
    Ok(Json(MessageResponse {
        message: "Heartbeat updated".to_string(),
    }))
}

/// GET /api/locks/{resource_id}: stored lease, without staleness recomputation.
pub async fn get_lease(
    State(state): State<AppState>,
    ApiPath(resource_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.leases.inspect(resource_id).await?))
}

/// GET /api/locks: every lease, most recently acquired first.
pub async fn list_leases(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.leases.list_all().await?))
}
