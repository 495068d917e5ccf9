use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde_json::json;
use validator::Validate;

use crate::{
    dto::matching_dto::{MatchingQuery, SetWeightsPayload},
    error::Result,
    middleware::auth::CurrentUser,
    models::pillar::Pillar,
    services::admin_log_service::RequestOrigin,
    AppState,
};

#[axum::debug_handler]
pub async fn list_weights(
    State(state): State<AppState>,
    Query(query): Query<MatchingQuery>,
) -> Result<impl IntoResponse> {
    let weights = state.matching_service.weights(query.pillar).await?;
    Ok(Json(weights))
}

#[utoipa::path(
    put,
    path = "/api/admin/matching/{pillar}",
    params(("pillar" = String, Path, description = "Pillar whose weights are replaced")),
    request_body = SetWeightsPayload,
    responses(
        (status = 200, description = "Weights after the update"),
        (status = 400, description = "Negative weight or provider outside the pillar")
    )
)]
#[axum::debug_handler]
pub async fn set_weights(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(pillar): Path<Pillar>,
    Json(payload): Json<SetWeightsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let count = payload.weights.len();
    let weights = state
        .matching_service
        .set_weights(pillar, payload.weights)
        .await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "matching.set_weights",
            "pillar",
            None,
            Some(json!({ "pillar": pillar, "updated": count })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok(Json(weights))
}

#[axum::debug_handler]
pub async fn simulate(
    State(state): State<AppState>,
    Path(pillar): Path<Pillar>,
) -> Result<impl IntoResponse> {
    let simulation = state.matching_service.simulate(pillar).await?;
    Ok(Json(simulation))
}
