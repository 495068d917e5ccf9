use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::Result, middleware::auth::CurrentUser, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotificationQuery {
    pub limit: i64,
}

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse> {
    let items = state
        .notification_service
        .list_for_user(user.id(), query.limit)
        .await?;
    Ok(Json(items))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let item = state.notification_service.mark_read(user.id(), id).await?;
    Ok(Json(item))
}
