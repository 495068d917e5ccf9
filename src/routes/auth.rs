use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use validator::Validate;

use crate::{
    dto::auth_dto::{
        ConfirmEmailPayload, LoginPayload, RedeemAccessCodePayload, RefreshPayload,
        ResetPasswordPayload, SignupPayload, UpdatePasswordPayload,
    },
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupPayload,
    responses(
        (status = 201, description = "Account created, confirmation pending"),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already registered")
    )
)]
#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state.auth_service.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Tokens, profile and post-login destination"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not confirmed"),
        (status = 429, description = "Too many attempts")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.auth_service.login(payload).await?;
    Ok(Json(session))
}

#[axum::debug_handler]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let tokens = state
        .auth_service
        .refresh_session(&payload.refresh_token)
        .await?;
    Ok(Json(tokens))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.logout(&payload.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Always 202 so the response does not reveal whether the account exists.
#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.reset_password(&payload.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Se o email estiver registado, receberá instruções para redefinir a palavra-passe."
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_password(
    State(state): State<AppState>,
    Json(payload): Json<UpdatePasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state
        .auth_service
        .update_password(&payload.token, payload.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn confirm_email(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmEmailPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.confirm_email(&payload.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/auth/redeem-access-code",
    request_body = RedeemAccessCodePayload,
    responses(
        (status = 201, description = "Employee account created"),
        (status = 400, description = "Invalid or mismatched code"),
        (status = 409, description = "Code already used or email registered")
    )
)]
#[axum::debug_handler]
pub async fn redeem_access_code(
    State(state): State<AppState>,
    Json(payload): Json<RedeemAccessCodePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state.auth_service.redeem_access_code(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
