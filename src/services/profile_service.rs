use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::auth_dto::UpdateProfilePayload;
use crate::error::{Error, Result};
use crate::models::profile::{Profile, Role};
use crate::services::profile_cache::ProfileCache;
use crate::services::session_events::{SessionEventKind, SessionEvents};

const PROFILE_COLUMNS: &str = "id, email, name, role, company_id, phone, avatar_url, is_active, \
     has_completed_onboarding, personal_sessions_allocated, personal_sessions_used, created_at, updated_at";

#[derive(Clone)]
pub struct ProfileService {
    pool: PgPool,
    cache: ProfileCache,
    events: SessionEvents,
}

impl ProfileService {
    pub fn new(pool: PgPool, events: SessionEvents) -> Self {
        Self {
            pool,
            cache: ProfileCache::new(Duration::from_secs(30)),
            events,
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Profile for an authenticated session, with the role taken from the
    /// privileged lookup. Never fails: see [`profile_or_fallback`].
    pub async fn current_profile(&self, user_id: Uuid, email: &str) -> Profile {
        self.cache
            .get_or_load(user_id, || async {
                let loaded = self.fetch_with_role(user_id).await;
                profile_or_fallback(user_id, email, loaded)
            })
            .await
    }

    pub fn forget(&self, user_id: Uuid) {
        self.cache.invalidate(user_id);
    }

    pub async fn refresh(&self, user_id: Uuid, email: &str) -> Profile {
        self.cache.invalidate(user_id);
        self.current_profile(user_id, email).await
    }

    async fn fetch_with_role(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let Some(mut profile) = self.get_by_id(user_id).await? else {
            return Ok(None);
        };
        if let Some(role) = self.primary_role(user_id).await? {
            profile.role = role;
        }
        Ok(Some(profile))
    }

    pub async fn get_by_id(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let query = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    pub async fn primary_role(&self, user_id: Uuid) -> Result<Option<Role>> {
        let role = sqlx::query_scalar::<_, Option<Role>>("SELECT get_user_primary_role($1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(role)
    }

    pub async fn update(&self, user_id: Uuid, payload: UpdateProfilePayload) -> Result<Profile> {
        let query = format!(
            r#"
            UPDATE profiles
            SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                avatar_url = COALESCE($4, avatar_url),
                has_completed_onboarding = COALESCE($5, has_completed_onboarding),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .bind(payload.name)
            .bind(payload.phone)
            .bind(payload.avatar_url)
            .bind(payload.has_completed_onboarding)
            .fetch_one(&self.pool)
            .await?;

        self.events.publish(SessionEventKind::UserUpdated, user_id);
        Ok(profile)
    }

    pub async fn list(&self, role: Option<Role>, company_id: Option<Uuid>) -> Result<Vec<Profile>> {
        let query = format!(
            "SELECT {} FROM profiles
             WHERE ($1::user_role IS NULL OR role = $1)
               AND ($2::uuid IS NULL OR company_id = $2)
             ORDER BY created_at DESC",
            PROFILE_COLUMNS
        );
        let items = sqlx::query_as::<_, Profile>(&query)
            .bind(role)
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Grants `role` and mirrors the resulting primary role onto the profile row.
    pub async fn grant_role(&self, user_id: Uuid, role: Role) -> Result<Profile> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT (user_id, role) DO NOTHING",
        )
        .bind(user_id)
        .bind(role)
        .execute(&mut *tx)
        .await?;
        let query = format!(
            "UPDATE profiles SET role = get_user_primary_role($1), updated_at = NOW()
             WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Utilizador não encontrado".into()))?;
        tx.commit().await?;

        self.events.publish(SessionEventKind::UserUpdated, user_id);
        Ok(profile)
    }

    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> Result<Profile> {
        let query = format!(
            "UPDATE profiles SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .bind(is_active)
            .fetch_one(&self.pool)
            .await?;
        self.events.publish(SessionEventKind::UserUpdated, user_id);
        Ok(profile)
    }
}

/// A valid session whose profile cannot be read gets the least-privileged
/// profile rather than an error.
pub fn profile_or_fallback(user_id: Uuid, email: &str, loaded: Result<Option<Profile>>) -> Profile {
    match loaded {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            tracing::warn!(%user_id, "Profile row missing, using minimal profile");
            Profile::minimal(user_id, email)
        }
        Err(e) => {
            tracing::warn!(%user_id, error = ?e, "Profile fetch failed, using minimal profile");
            Profile::minimal(user_id, email)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_falls_back_to_plain_user() {
        let id = Uuid::new_v4();
        let profile = profile_or_fallback(id, "x@y.pt", Err(Error::Internal("timeout".into())));
        assert_eq!(profile.id, id);
        assert_eq!(profile.role, Role::User);
    }

    #[test]
    fn loaded_profile_is_kept() {
        let id = Uuid::new_v4();
        let mut loaded = Profile::minimal(id, "hr@y.pt");
        loaded.role = Role::Hr;
        let profile = profile_or_fallback(id, "hr@y.pt", Ok(Some(loaded)));
        assert_eq!(profile.role, Role::Hr);
    }
}
