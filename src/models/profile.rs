use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Hr,
    Prestador,
    Specialist,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Hr => "hr",
            Role::Prestador => "prestador",
            Role::Specialist => "specialist",
        }
    }

    /// Landing route after login.
    pub fn home_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::User => "/user/dashboard",
            Role::Hr => "/company/dashboard",
            Role::Prestador => "/prestador/dashboard",
            Role::Specialist => "/especialista/dashboard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub has_completed_onboarding: bool,
    pub personal_sessions_allocated: i32,
    pub personal_sessions_used: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Used when the session is valid but the profile row cannot be read.
    pub fn minimal(id: Uuid, email: &str) -> Self {
        Self {
            id,
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            role: Role::User,
            company_id: None,
            phone: None,
            avatar_url: None,
            is_active: true,
            has_completed_onboarding: false,
            personal_sessions_allocated: 0,
            personal_sessions_used: 0,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn personal_sessions_remaining(&self) -> i32 {
        (self.personal_sessions_allocated - self.personal_sessions_used).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub is_admin: bool,
    pub is_hr: bool,
    pub is_prestador: bool,
    pub is_specialist: bool,
    pub is_user: bool,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        let role = profile.role;
        Self {
            is_admin: role == Role::Admin,
            is_hr: role == Role::Hr,
            is_prestador: role == Role::Prestador,
            is_specialist: role == Role::Specialist,
            is_user: role == Role::User,
            profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_profile_never_elevates() {
        let profile = Profile::minimal(Uuid::new_v4(), "ana@empresa.pt");
        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.name, "ana");

        let view = ProfileView::from(profile);
        assert!(view.is_user);
        assert!(!view.is_admin && !view.is_hr && !view.is_prestador && !view.is_specialist);
    }
}
