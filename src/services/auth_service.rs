use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::dto::auth_dto::{
    LoginPayload, LoginResponse, RedeemAccessCodePayload, SignupPayload, SignupResponse, TokenPair,
};
use crate::error::{is_unique_violation, AuthError, Error, Result};
use crate::middleware::auth::issue_access_token;
use crate::middleware::rate_limit::RateLimiter;
use crate::models::employee::CompanyEmployee;
use crate::models::profile::Role;
use crate::services::navigation_service::post_login_redirect;
use crate::services::notification_service::NotificationService;
use crate::services::profile_service::ProfileService;
use crate::services::session_events::SessionEventKind;
use crate::utils::crypto::{digest_token, hash_password, verify_password};
use crate::utils::token::{generate_opaque_token, normalize_access_code};
use crate::utils::validation::normalize_email;

const OPAQUE_TOKEN_LEN: usize = 48;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, FromRow)]
struct AuthUserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    email_confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    profiles: ProfileService,
    notifications: NotificationService,
    login_limiter: RateLimiter,
    jwt_secret: String,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("hash task failed: {}", e)))?
        .map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))
}

async fn verify_blocking(password: String, hashed: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hashed))
        .await
        .map_err(|e| Error::Internal(format!("verify task failed: {}", e)))?
        .map_err(|e| Error::Internal(format!("stored hash unreadable: {}", e)))
}

fn registration_error(err: sqlx::Error) -> Error {
    if is_unique_violation(&err) {
        Error::Auth(AuthError::AlreadyRegistered)
    } else {
        err.into()
    }
}

impl AuthService {
    pub fn new(
        pool: PgPool,
        profiles: ProfileService,
        notifications: NotificationService,
        config: &Config,
    ) -> Self {
        Self {
            pool,
            profiles,
            notifications,
            login_limiter: RateLimiter::new(config.login_attempts_per_minute, Duration::from_secs(60)),
            jwt_secret: config.jwt_secret.clone(),
            access_ttl_minutes: config.access_token_ttl_minutes,
            refresh_ttl_days: config.refresh_token_ttl_days,
        }
    }

    pub async fn signup(&self, payload: SignupPayload) -> Result<SignupResponse> {
        let email = normalize_email(&payload.email);
        let password_hash = hash_blocking(payload.password).await?;
        let confirmation = generate_opaque_token(OPAQUE_TOKEN_LEN);

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO auth_users (email, password_hash, confirmation_token_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(digest_token(&confirmation, &self.jwt_secret))
        .fetch_one(&self.pool)
        .await
        .map_err(registration_error)?;

        // Profile and role rows are written independently; either may fail
        // without undoing the other or the account itself.
        let name = payload.name.trim().to_string();
        let profile_insert = sqlx::query("INSERT INTO profiles (id, email, name) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(&email)
            .bind(&name)
            .execute(&self.pool);
        let role_insert = sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(Role::User)
            .execute(&self.pool);
        let (profile_res, role_res) = tokio::join!(profile_insert, role_insert);
        if let Err(e) = profile_res {
            tracing::warn!(%user_id, error = ?e, "Profile insert failed during signup");
        }
        if let Err(e) = role_res {
            tracing::warn!(%user_id, error = ?e, "Role insert failed during signup");
        }

        self.notifications
            .notify_quietly(
                user_id,
                "email_confirmation",
                "Confirme o seu email",
                "Use o link enviado para confirmar a sua conta.",
                Some(json!({ "token": confirmation })),
            )
            .await;

        tracing::info!(%user_id, "User signed up");
        Ok(SignupResponse {
            user_id,
            email,
            confirmation_required: true,
        })
    }

    pub async fn confirm_email(&self, token: &str) -> Result<()> {
        let confirmed = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE auth_users
            SET email_confirmed_at = NOW(), confirmation_token_hash = NULL, updated_at = NOW()
            WHERE confirmation_token_hash = $1
            RETURNING id
            "#,
        )
        .bind(digest_token(token.trim(), &self.jwt_secret))
        .fetch_optional(&self.pool)
        .await?;

        match confirmed {
            Some(user_id) => {
                tracing::info!(%user_id, "Email confirmed");
                Ok(())
            }
            None => Err(AuthError::InvalidToken.into()),
        }
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<LoginResponse> {
        let email = normalize_email(&payload.email);
        if !self.login_limiter.allow(&email) {
            return Err(AuthError::RateLimited.into());
        }

        let user = sqlx::query_as::<_, AuthUserRow>(
            "SELECT id, email, password_hash, email_confirmed_at FROM auth_users WHERE email = $1",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        if !verify_blocking(payload.password, user.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if user.email_confirmed_at.is_none() {
            return Err(AuthError::EmailNotConfirmed.into());
        }
        self.login_limiter.reset(&email);

        let profile = self.profiles.refresh(user.id, &user.email).await;
        if !profile.is_active {
            return Err(Error::Forbidden("Conta desativada.".into()));
        }

        let tokens = self.open_session(user.id, &user.email).await?;
        self.profiles
            .events()
            .publish(SessionEventKind::SignedIn, user.id);

        let redirect_to = post_login_redirect(payload.redirect_to.as_deref(), profile.role);
        tracing::info!(user_id = %user.id, role = profile.role.as_str(), "User logged in");
        Ok(LoginResponse {
            tokens,
            profile: profile.into(),
            redirect_to,
        })
    }

    async fn open_session(&self, user_id: Uuid, email: &str) -> Result<TokenPair> {
        let access_token =
            issue_access_token(user_id, email, &self.jwt_secret, self.access_ttl_minutes)?;
        let refresh_token = generate_opaque_token(OPAQUE_TOKEN_LEN);
        let expires_at = Utc::now() + chrono::Duration::days(self.refresh_ttl_days);

        sqlx::query(
            "INSERT INTO auth_sessions (user_id, refresh_token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(digest_token(&refresh_token, &self.jwt_secret))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.access_ttl_minutes * 60,
        })
    }

    /// Revokes the live session behind `refresh_token` and returns its owner.
    async fn revoke_session(&self, refresh_token: &str) -> Result<Option<Uuid>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE auth_sessions SET revoked_at = NOW()
            WHERE refresh_token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
            RETURNING user_id
            "#,
        )
        .bind(digest_token(refresh_token, &self.jwt_secret))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }

    /// Refresh tokens are single-use: each refresh revokes the old session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair> {
        let user_id = self
            .revoke_session(refresh_token)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM auth_users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let tokens = self.open_session(user_id, &email).await?;
        self.profiles
            .events()
            .publish(SessionEventKind::TokenRefreshed, user_id);
        Ok(tokens)
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        if let Some(user_id) = self.revoke_session(refresh_token).await? {
            self.profiles
                .events()
                .publish(SessionEventKind::SignedOut, user_id);
            tracing::info!(%user_id, "User logged out");
        }
        Ok(())
    }

    /// Succeeds whether or not the email belongs to an account.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let Some(user_id) =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM auth_users WHERE email = $1")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await?
        else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_opaque_token(OPAQUE_TOKEN_LEN);
        let expires_at = Utc::now() + chrono::Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        sqlx::query("INSERT INTO password_resets (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(digest_token(&token, &self.jwt_secret))
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        self.notifications
            .notify_quietly(
                user_id,
                "password_reset",
                "Recuperação de palavra-passe",
                "Recebemos um pedido para redefinir a sua palavra-passe.",
                Some(json!({ "token": token })),
            )
            .await;
        self.profiles
            .events()
            .publish(SessionEventKind::PasswordRecovery, user_id);
        Ok(())
    }

    /// Consumes a reset token, sets the new password and signs out every session.
    pub async fn update_password(&self, token: &str, password: String) -> Result<()> {
        let password_hash = hash_blocking(password).await?;

        let mut tx = self.pool.begin().await?;
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE password_resets SET used_at = NOW()
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
            RETURNING user_id
            "#,
        )
        .bind(digest_token(token.trim(), &self.jwt_secret))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::InvalidToken)?;

        sqlx::query("UPDATE auth_users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE auth_sessions SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.profiles
            .events()
            .publish(SessionEventKind::SignedOut, user_id);
        tracing::info!(%user_id, "Password updated");
        Ok(())
    }

    /// Registers an employee against their company with a one-time access code.
    /// The code was delivered to the roster email, so the account starts confirmed.
    pub async fn redeem_access_code(&self, payload: RedeemAccessCodePayload) -> Result<SignupResponse> {
        let code = normalize_access_code(&payload.code);
        let email = normalize_email(&payload.email);
        let password_hash = hash_blocking(payload.password).await?;

        let mut tx = self.pool.begin().await?;
        let employee = sqlx::query_as::<_, CompanyEmployee>(
            r#"
            SELECT id, company_id, user_id, name, email, access_code, sessions_allocated,
                   sessions_used, registered_at, created_at
            FROM company_employees
            WHERE access_code = $1
            FOR UPDATE
            "#,
        )
        .bind(&code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::BadRequest("Código de acesso inválido.".into()))?;

        if employee.user_id.is_some() || employee.registered_at.is_some() {
            return Err(Error::Conflict("Este código de acesso já foi utilizado.".into()));
        }
        if normalize_email(&employee.email) != email {
            return Err(Error::BadRequest(
                "O email não corresponde ao código de acesso.".into(),
            ));
        }
        let company_active =
            sqlx::query_scalar::<_, bool>("SELECT is_active FROM companies WHERE id = $1")
                .bind(employee.company_id)
                .fetch_one(&mut *tx)
                .await?;
        if !company_active {
            return Err(Error::BadRequest("A empresa associada não está ativa.".into()));
        }

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO auth_users (email, password_hash, email_confirmed_at)
            VALUES ($1, $2, NOW())
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(registration_error)?;

        sqlx::query("INSERT INTO profiles (id, email, name, company_id) VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(&email)
            .bind(payload.name.trim())
            .bind(employee.company_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(Role::User)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE company_employees SET user_id = $2, registered_at = NOW() WHERE id = $1")
            .bind(employee.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(%user_id, company_id = %employee.company_id, "Access code redeemed");
        Ok(SignupResponse {
            user_id,
            email,
            confirmation_required: false,
        })
    }
}
