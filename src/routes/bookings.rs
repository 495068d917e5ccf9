use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::booking_dto::{
        BookingListQuery, CreateBookingPayload, RatingPayload, ReferralPayload, ReschedulePayload,
        SessionNotesPayload, TransitionPayload,
    },
    error::Result,
    middleware::auth::CurrentUser,
    models::profile::Role,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/bookings",
    params(
        ("status" = Option<String>, Query, description = "Filter by booking status"),
        ("from" = Option<String>, Query, description = "First day, YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "Last day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Bookings visible to the caller")
    )
)]
#[axum::debug_handler]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<BookingListQuery>,
) -> Result<impl IntoResponse> {
    let items = state.booking_service.list(&user.0, query).await?;
    Ok(Json(items))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let booking = state.booking_service.get_for(&user.0, id).await?;
    Ok(Json(booking))
}

#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBookingPayload,
    responses(
        (status = 201, description = "Booking scheduled"),
        (status = 400, description = "Invalid booking or no quota left"),
        (status = 409, description = "Slot already taken")
    )
)]
#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let booking = state.booking_service.create(&user.0, payload).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[axum::debug_handler]
pub async fn create_referral(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ReferralPayload>,
) -> Result<impl IntoResponse> {
    user.require(&[Role::Specialist, Role::Admin])?;
    payload.validate()?;
    let booking = state
        .booking_service
        .create_referral(&user.0, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{id}/status",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = TransitionPayload,
    responses(
        (status = 200, description = "Booking with its new status"),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Caller may not set this status")
    )
)]
#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let booking = state
        .booking_service
        .transition(&user.0, id, payload.status, payload.reason)
        .await?;
    Ok(Json(booking))
}

#[axum::debug_handler]
pub async fn reschedule(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReschedulePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state
        .booking_service
        .reschedule(&user.0, id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[axum::debug_handler]
pub async fn rate_booking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let booking = state.booking_service.rate(&user.0, id, payload).await?;
    Ok(Json(booking))
}

#[axum::debug_handler]
pub async fn session_notes(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SessionNotesPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let booking = state
        .booking_service
        .save_notes(&user.0, id, payload)
        .await?;
    Ok(Json(booking))
}

#[axum::debug_handler]
pub async fn booking_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let chat = state.booking_service.chat(&user.0, id).await?;
    Ok(Json(chat))
}
