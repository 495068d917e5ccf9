use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::resource_dto::{
        CreateResourcePayload, ResourceQuery, ThumbnailResponse, UpdateResourcePayload,
    },
    error::{Error, Result},
    middleware::auth::CurrentUser,
    services::admin_log_service::RequestOrigin,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/resources",
    params(
        ("pillar" = Option<String>, Query, description = "Filter by pillar"),
        ("type" = Option<String>, Query, description = "Filter by resource type")
    ),
    responses(
        (status = 200, description = "Resources visible to the caller")
    )
)]
#[axum::debug_handler]
pub async fn list_resources(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ResourceQuery>,
) -> Result<impl IntoResponse> {
    let items = state.resource_service.list(&user.0, query).await?;
    Ok(Json(items))
}

#[axum::debug_handler]
pub async fn get_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let resource = state.resource_service.get_for(&user.0, id).await?;
    Ok(Json(resource))
}

#[axum::debug_handler]
pub async fn admin_create_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(payload): Json<CreateResourcePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let resource = state.resource_service.create(user.id(), payload).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "resource.create",
            "resource",
            Some(resource.id),
            Some(json!({ "title": resource.title, "is_premium": resource.is_premium })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok((StatusCode::CREATED, Json(resource)))
}

#[axum::debug_handler]
pub async fn admin_update_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResourcePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let resource = state.resource_service.update(id, payload).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "resource.update",
            "resource",
            Some(id),
            Some(json!({ "is_active": resource.is_active })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok(Json(resource))
}

#[axum::debug_handler]
pub async fn admin_delete_resource(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.resource_service.delete(id).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "resource.delete",
            "resource",
            Some(id),
            None,
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/admin/resources/{id}/thumbnail",
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "Public URL of the stored thumbnail", body = ThumbnailResponse),
        (status = 400, description = "Missing, oversized or non-image file")
    )
)]
#[axum::debug_handler]
pub async fn admin_upload_thumbnail(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        let thumbnail_url = state
            .resource_service
            .set_thumbnail(id, &filename, &data)
            .await?;
        state
            .admin_log_service
            .record(
                user.id(),
                "resource.thumbnail",
                "resource",
                Some(id),
                Some(json!({ "thumbnail_url": thumbnail_url })),
                &RequestOrigin::from_headers(&headers),
            )
            .await;
        return Ok(Json(ThumbnailResponse { thumbnail_url }));
    }
    Err(Error::BadRequest("Envie a imagem no campo \"file\".".into()))
}
