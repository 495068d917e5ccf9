use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

const GENERIC_FAILURE: &str = "Ocorreu um erro. Por favor tente novamente.";

/// Failures of the authentication flow that the client shows to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email not confirmed")]
    EmailNotConfirmed,
    #[error("too many attempts")]
    RateLimited,
    #[error("email already registered")]
    AlreadyRegistered,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("{0}")]
    Other(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::EmailNotConfirmed => "email_not_confirmed",
            AuthError::RateLimited => "rate_limited",
            AuthError::AlreadyRegistered => "already_registered",
            AuthError::InvalidToken => "invalid_token",
            AuthError::Other(_) => "auth_error",
        }
    }

    /// Known causes get a fixed user-facing message; anything else is passed through.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Email ou palavra-passe incorretos.".to_string(),
            AuthError::EmailNotConfirmed => {
                "Confirme o seu email antes de iniciar sessão.".to_string()
            }
            AuthError::RateLimited => {
                "Demasiadas tentativas. Aguarde alguns minutos e tente novamente.".to_string()
            }
            AuthError::AlreadyRegistered => "Este email já está registado.".to_string(),
            AuthError::InvalidToken => "Sessão inválida ou expirada.".to_string(),
            AuthError::Other(message) => message.clone(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::EmailNotConfirmed => StatusCode::FORBIDDEN,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::AlreadyRegistered => StatusCode::CONFLICT,
            AuthError::Other(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Error::Auth(err) => {
                let body = Json(json!({ "error": err.user_message(), "code": err.code() }));
                return (err.status(), body).into_response();
            }
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Multipart(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Csv(err) => (StatusCode::BAD_REQUEST, format!("CSV inválido: {}", err)),
            Error::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken.user_message(),
            ),
            other => {
                tracing::error!(error = ?other, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_string())
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

/// Postgres unique violations carry SQLSTATE 23505.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
