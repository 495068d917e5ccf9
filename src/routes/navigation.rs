use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::Result,
    middleware::auth::optional_user,
    services::navigation_service::{build_menu, resolve_entry, route_access},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct RouteAccessQuery {
    pub path: String,
}

#[utoipa::path(
    get,
    path = "/api/navigation/menu",
    responses(
        (status = 200, description = "Ordered menu for the caller, with what each entry does")
    )
)]
#[axum::debug_handler]
pub async fn menu(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    let user = optional_user(&state, &headers).await;
    let authenticated = user.is_some();
    let role = user.as_ref().map(|u| u.role());

    let items: Vec<_> = build_menu(role, authenticated)
        .into_iter()
        .map(|entry| {
            let resolution = resolve_entry(&entry, authenticated);
            json!({ "entry": entry, "resolution": resolution })
        })
        .collect();

    Ok(Json(json!({
        "authenticated": authenticated,
        "role": role,
        "items": items,
    })))
}

#[axum::debug_handler]
pub async fn route_access_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RouteAccessQuery>,
) -> Result<impl IntoResponse> {
    let role = optional_user(&state, &headers).await.map(|u| u.role());
    Ok(Json(route_access(query.path.trim(), role)))
}
