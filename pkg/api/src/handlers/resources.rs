use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use pkg_types::resource::CreateResourceRequest;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};

/// POST /api/resources: register a resource.
pub async fn create_resource(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateResourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resource = state.registry.create(&req.kind, &req.identifier).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

/// GET /api/resources: all resources by type, then identifier.
pub async fn list_resources(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.registry.list().await?))
}

/// GET /api/resources/{id}
pub async fn get_resource(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.registry.get(id).await?))
}
