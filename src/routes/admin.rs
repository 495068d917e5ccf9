use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::auth_dto::{AdminUpdateUserPayload, UserListQuery},
    error::{Error, Result},
    middleware::auth::CurrentUser,
    models::profile::ProfileView,
    services::admin_log_service::RequestOrigin,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogQuery {
    pub limit: i64,
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse> {
    let users: Vec<ProfileView> = state
        .profile_service
        .list(query.role, query.company_id)
        .await?
        .into_iter()
        .map(ProfileView::from)
        .collect();
    Ok(Json(users))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = AdminUpdateUserPayload,
    responses(
        (status = 200, description = "Updated profile", body = ProfileView),
        (status = 400, description = "Nothing to change or self-deactivation"),
        (status = 404, description = "User not found")
    )
)]
#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUpdateUserPayload>,
) -> Result<impl IntoResponse> {
    if payload.grant_role.is_none() && payload.is_active.is_none() {
        return Err(Error::BadRequest("Nada para atualizar.".into()));
    }
    if id == user.id() && payload.is_active == Some(false) {
        return Err(Error::BadRequest("Não pode desativar a sua própria conta.".into()));
    }

    let mut profile = None;
    if let Some(role) = payload.grant_role {
        profile = Some(state.profile_service.grant_role(id, role).await?);
    }
    if let Some(active) = payload.is_active {
        profile = Some(state.profile_service.set_active(id, active).await?);
    }
    let profile = profile.ok_or_else(|| Error::NotFound("Utilizador não encontrado".into()))?;
    state.profile_service.forget(id);

    state
        .admin_log_service
        .record(
            user.id(),
            "user.update",
            "user",
            Some(id),
            Some(json!({ "grant_role": payload.grant_role, "is_active": payload.is_active })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok(Json(ProfileView::from(profile)))
}

#[axum::debug_handler]
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<impl IntoResponse> {
    let logs = state.admin_log_service.recent(query.limit).await?;
    Ok(Json(logs))
}
