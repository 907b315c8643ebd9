use axum::{Json, extract::State, response::IntoResponse};
use pkg_types::advisor::SuggestRequest;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::ApiJson;

/// POST /api/advisor/suggest: TTL recommendation from past lease durations.
pub async fn suggest_ttl(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SuggestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let suggestion = state
        .advisor
        .suggest(req.resource_id, req.historical_ttl)
        .await?;
    Ok(Json(suggestion))
}
