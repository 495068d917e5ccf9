use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::prestador_dto::{
        AvailabilityQuery, BlockDatePayload, BlockedDatesQuery, CreatePrestadorPayload,
        PrestadorListQuery, UpdatePrestadorPayload,
    },
    error::{Error, Result},
    middleware::auth::CurrentUser,
    services::{admin_log_service::RequestOrigin, prestador_service::ensure_manages},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/prestadores",
    params(("pillar" = Option<String>, Query, description = "Only providers serving this pillar")),
    responses(
        (status = 200, description = "Approved and active providers")
    )
)]
#[axum::debug_handler]
pub async fn list_prestadores(
    State(state): State<AppState>,
    Query(query): Query<PrestadorListQuery>,
) -> Result<impl IntoResponse> {
    let items = state.prestador_service.list(query.pillar).await?;
    Ok(Json(items))
}

#[axum::debug_handler]
pub async fn get_prestador(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let prestador = state.prestador_service.get(id).await?;
    if !prestador.is_bookable() && !user.is_admin() && prestador.user_id != Some(user.id()) {
        return Err(Error::NotFound("Prestador não encontrado.".into()));
    }
    Ok(Json(prestador))
}

#[utoipa::path(
    get,
    path = "/api/prestadores/{id}/availability",
    params(
        ("id" = Uuid, Path, description = "Provider id"),
        ("date" = String, Query, description = "Day to check, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Free slots on the day"),
        (status = 404, description = "Provider not found")
    )
)]
#[axum::debug_handler]
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse> {
    let prestador = state.prestador_service.get(id).await?;
    let slots = state
        .availability_service
        .availability(&prestador, query.date)
        .await?;
    Ok(Json(slots))
}

#[axum::debug_handler]
pub async fn list_blocked_dates(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<BlockedDatesQuery>,
) -> Result<impl IntoResponse> {
    let prestador = state.prestador_service.get(id).await?;
    ensure_manages(&user.0, &prestador)?;
    let rows = state
        .prestador_service
        .blocked_dates(id, query.from, query.to)
        .await?;
    Ok(Json(rows))
}

#[axum::debug_handler]
pub async fn block_date(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BlockDatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let prestador = state.prestador_service.get(id).await?;
    ensure_manages(&user.0, &prestador)?;
    let row = state.prestador_service.block(id, payload).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[axum::debug_handler]
pub async fn unblock_date(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, block_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let prestador = state.prestador_service.get(id).await?;
    ensure_manages(&user.0, &prestador)?;
    state.prestador_service.unblock(id, block_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn admin_list_prestadores(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let items = state.prestador_service.list_all().await?;
    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/api/admin/prestadores",
    request_body = CreatePrestadorPayload,
    responses(
        (status = 201, description = "Provider created and role granted"),
        (status = 409, description = "User already has a provider record")
    )
)]
#[axum::debug_handler]
pub async fn admin_create_prestador(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(payload): Json<CreatePrestadorPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let prestador = state.prestador_service.create(payload).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "prestador.create",
            "prestador",
            Some(prestador.id),
            Some(json!({ "name": prestador.name, "pillars": prestador.pillars })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok((StatusCode::CREATED, Json(prestador)))
}

#[axum::debug_handler]
pub async fn admin_update_prestador(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePrestadorPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let prestador = state.prestador_service.update(id, payload).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "prestador.update",
            "prestador",
            Some(id),
            Some(json!({
                "is_approved": prestador.is_approved,
                "is_active": prestador.is_active,
            })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok(Json(prestador))
}
