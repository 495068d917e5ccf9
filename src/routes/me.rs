use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::auth_dto::UpdateProfilePayload,
    error::Result,
    middleware::auth::CurrentUser,
    models::profile::ProfileView,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile of the caller", body = ProfileView),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[axum::debug_handler]
pub async fn get_me(user: CurrentUser) -> Result<impl IntoResponse> {
    Ok(Json(ProfileView::from(user.0)))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.profile_service.update(user.id(), payload).await?;
    let profile = state.profile_service.refresh(user.id(), &user.0.email).await;
    Ok(Json(ProfileView::from(profile)))
}

/// Drops the cached profile and loads it again, e.g. after a role change.
#[axum::debug_handler]
pub async fn refresh_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let profile = state.profile_service.refresh(user.id(), &user.0.email).await;
    Ok(Json(ProfileView::from(profile)))
}

#[axum::debug_handler]
pub async fn quota(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse> {
    let quota = state.booking_service.quota(&user.0).await?;
    Ok(Json(quota))
}
