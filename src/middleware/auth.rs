use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{AuthError, Error},
    models::profile::{Profile, Role},
    AppState,
};

/// Access-token claims. The role is deliberately absent: it is looked up on
/// every request instead of being trusted from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_access_token(
    user_id: Uuid,
    email: &str,
    secret: &str,
    ttl_minutes: i64,
) -> crate::error::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (now + Duration::minutes(ttl_minutes)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

/// Extracts the bearer token, or the machine-readable reason it is missing.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing_authorization")?;
    let auth_str = auth_header.to_str().map_err(|_| "bad_authorization")?;
    auth_str.strip_prefix("Bearer ").ok_or("unsupported_scheme")
}

fn reject(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

#[derive(Debug, Clone)]
pub struct CurrentUser(pub Profile);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.0.role)
    }

    pub fn is_admin(&self) -> bool {
        self.0.role == Role::Admin
    }

    pub fn require(&self, allowed: &[Role]) -> crate::error::Result<()> {
        if self.has_role(allowed) {
            Ok(())
        } else {
            Err(Error::Forbidden("Sem permissão para esta operação.".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(Error::Auth(AuthError::InvalidToken))
    }
}

pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(req.headers()) {
        Ok(token) => token,
        Err(code) => return reject(StatusCode::UNAUTHORIZED, code),
    };

    let config = crate::config::get_config();
    let claims = match decode_access_token(token, &config.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => return reject(StatusCode::UNAUTHORIZED, "invalid_token"),
    };

    let profile = state
        .profile_service
        .current_profile(claims.sub, &claims.email)
        .await;
    if !profile.is_active {
        return reject(StatusCode::FORBIDDEN, "account_disabled");
    }

    req.extensions_mut().insert(CurrentUser(profile));
    next.run(req).await
}

/// Resolves the caller when a valid token is present; anonymous otherwise.
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let token = bearer_token(headers).ok()?;
    let config = crate::config::get_config();
    let claims = decode_access_token(token, &config.jwt_secret).ok()?;
    let profile = state
        .profile_service
        .current_profile(claims.sub, &claims.email)
        .await;
    profile.is_active.then_some(CurrentUser(profile))
}

pub async fn require_roles(req: Request, next: Next, allowed: &[Role]) -> Response {
    let Some(user) = req.extensions().get::<CurrentUser>() else {
        return reject(StatusCode::UNAUTHORIZED, "missing_authorization");
    };
    if !allowed.is_empty() && !user.has_role(allowed) {
        return reject(StatusCode::FORBIDDEN, "forbidden");
    }
    next.run(req).await
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::Admin]).await
}

pub async fn require_hr_or_admin(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::Hr, Role::Admin]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_decode_with_same_secret() {
        let id = Uuid::new_v4();
        let token = issue_access_token(id, "rita@empresa.pt", "s3cret", 5).unwrap();
        let claims = decode_access_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "rita@empresa.pt");
        assert_eq!(
            decode_access_token(&token, "other").unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = issue_access_token(Uuid::new_v4(), "a@b.pt", "s3cret", -10).unwrap();
        assert!(decode_access_token(&token, "s3cret").is_err());
    }

    #[test]
    fn bearer_parsing_reports_reason() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err("missing_authorization"));
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Err("unsupported_scheme"));
        headers.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Ok("abc"));
    }
}
