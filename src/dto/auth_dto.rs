use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::profile::{ProfileView, Role};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupPayload {
    #[validate(email(message = "Email inválido."))]
    pub email: String,
    #[validate(length(min = 8, message = "A palavra-passe deve ter pelo menos 8 caracteres."))]
    pub password: String,
    #[validate(length(min = 2, max = 120, message = "Indique o seu nome."))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub email: String,
    pub confirmation_required: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(email(message = "Email inválido."))]
    pub email: String,
    #[validate(length(min = 1, message = "Indique a palavra-passe."))]
    pub password: String,
    /// Destination recorded before the login redirect.
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub profile: ProfileView,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshPayload {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordPayload {
    #[validate(email(message = "Email inválido."))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePasswordPayload {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, message = "A palavra-passe deve ter pelo menos 8 caracteres."))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmEmailPayload {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RedeemAccessCodePayload {
    #[validate(length(min = 4, max = 32, message = "Código de acesso inválido."))]
    pub code: String,
    #[validate(email(message = "Email inválido."))]
    pub email: String,
    #[validate(length(min = 8, message = "A palavra-passe deve ter pelo menos 8 caracteres."))]
    pub password: String,
    #[validate(length(min = 2, max = 120, message = "Indique o seu nome."))]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfilePayload {
    #[validate(length(min = 2, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
    pub has_completed_onboarding: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminUpdateUserPayload {
    pub grant_role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaResponse {
    pub payer_company: Option<CompanyQuota>,
    pub personal_allocated: i32,
    pub personal_used: i32,
    pub personal_remaining: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyQuota {
    pub company_id: Uuid,
    pub company_name: String,
    pub company_remaining: i32,
    pub employee_allocated: i32,
    pub employee_used: i32,
}
