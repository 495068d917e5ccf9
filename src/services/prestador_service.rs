use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::prestador_dto::{BlockDatePayload, CreatePrestadorPayload, UpdatePrestadorPayload};
use crate::error::{is_unique_violation, Error, Result};
use crate::models::pillar::Pillar;
use crate::models::prestador::{BlockedDate, Prestador};
use crate::models::profile::{Profile, Role};
use crate::services::profile_service::ProfileService;
use crate::utils::validation::normalize_email;

const PRESTADOR_COLUMNS: &str = "id, user_id, name, email, bio, specialties, pillars, available_weekdays, \
     is_approved, is_active, created_at, updated_at";

const BLOCKED_COLUMNS: &str = "id, prestador_id, blocked_date, blocked_time, reason, created_at";

#[derive(Clone)]
pub struct PrestadorService {
    pool: PgPool,
    profiles: ProfileService,
}

/// Calendar changes are limited to the provider themself and admins.
pub fn ensure_manages(caller: &Profile, prestador: &Prestador) -> Result<()> {
    if caller.role == Role::Admin || prestador.user_id == Some(caller.id) {
        Ok(())
    } else {
        Err(Error::Forbidden("Só pode gerir a sua própria agenda.".into()))
    }
}

impl PrestadorService {
    pub fn new(pool: PgPool, profiles: ProfileService) -> Self {
        Self { pool, profiles }
    }

    /// Bookable providers only.
    pub async fn list(&self, pillar: Option<Pillar>) -> Result<Vec<Prestador>> {
        let query = format!(
            "SELECT {} FROM prestadores
             WHERE is_approved AND is_active
               AND ($1::pillar IS NULL OR $1 = ANY(pillars))
             ORDER BY name",
            PRESTADOR_COLUMNS
        );
        let items = sqlx::query_as::<_, Prestador>(&query)
            .bind(pillar)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn list_all(&self) -> Result<Vec<Prestador>> {
        let query = format!("SELECT {} FROM prestadores ORDER BY created_at DESC", PRESTADOR_COLUMNS);
        let items = sqlx::query_as::<_, Prestador>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<Prestador> {
        let query = format!("SELECT {} FROM prestadores WHERE id = $1", PRESTADOR_COLUMNS);
        sqlx::query_as::<_, Prestador>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Prestador não encontrado.".into()))
    }

    pub async fn create(&self, payload: CreatePrestadorPayload) -> Result<Prestador> {
        let query = format!(
            r#"
            INSERT INTO prestadores (user_id, name, email, bio, specialties, pillars, available_weekdays, is_approved)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, '{{1,2,3,4,5}}'::smallint[]), $8)
            RETURNING {}
            "#,
            PRESTADOR_COLUMNS
        );
        let prestador = sqlx::query_as::<_, Prestador>(&query)
            .bind(payload.user_id)
            .bind(payload.name.trim())
            .bind(normalize_email(&payload.email))
            .bind(payload.bio)
            .bind(payload.specialties)
            .bind(payload.pillars)
            .bind(payload.available_weekdays)
            .bind(payload.is_approved)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict("Este utilizador já é prestador.".into())
                } else {
                    e.into()
                }
            })?;

        self.profiles.grant_role(payload.user_id, Role::Prestador).await?;
        tracing::info!(prestador_id = %prestador.id, "Prestador created");
        Ok(prestador)
    }

    pub async fn update(&self, id: Uuid, payload: UpdatePrestadorPayload) -> Result<Prestador> {
        let query = format!(
            r#"
            UPDATE prestadores
            SET
                name = COALESCE($2, name),
                bio = COALESCE($3, bio),
                specialties = COALESCE($4, specialties),
                pillars = COALESCE($5, pillars),
                available_weekdays = COALESCE($6, available_weekdays),
                is_approved = COALESCE($7, is_approved),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRESTADOR_COLUMNS
        );
        sqlx::query_as::<_, Prestador>(&query)
            .bind(id)
            .bind(payload.name)
            .bind(payload.bio)
            .bind(payload.specialties)
            .bind(payload.pillars)
            .bind(payload.available_weekdays)
            .bind(payload.is_approved)
            .bind(payload.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Prestador não encontrado.".into()))
    }

    pub async fn blocked_dates(
        &self,
        prestador_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<BlockedDate>> {
        let query = format!(
            "SELECT {} FROM prestador_blocked_dates
             WHERE prestador_id = $1
               AND ($2::date IS NULL OR blocked_date >= $2)
               AND ($3::date IS NULL OR blocked_date <= $3)
             ORDER BY blocked_date, blocked_time NULLS FIRST",
            BLOCKED_COLUMNS
        );
        let rows = sqlx::query_as::<_, BlockedDate>(&query)
            .bind(prestador_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn block(&self, prestador_id: Uuid, payload: BlockDatePayload) -> Result<BlockedDate> {
        let query = format!(
            "INSERT INTO prestador_blocked_dates (prestador_id, blocked_date, blocked_time, reason)
             VALUES ($1, $2, $3, $4) RETURNING {}",
            BLOCKED_COLUMNS
        );
        let row = sqlx::query_as::<_, BlockedDate>(&query)
            .bind(prestador_id)
            .bind(payload.date)
            .bind(payload.time)
            .bind(payload.reason)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn unblock(&self, prestador_id: Uuid, block_id: Uuid) -> Result<()> {
        let removed = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM prestador_blocked_dates WHERE id = $1 AND prestador_id = $2 RETURNING id",
        )
        .bind(block_id)
        .bind(prestador_id)
        .fetch_optional(&self.pool)
        .await?;
        removed
            .map(|_| ())
            .ok_or_else(|| Error::NotFound("Bloqueio não encontrado.".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prestador(user_id: Option<Uuid>) -> Prestador {
        Prestador {
            id: Uuid::new_v4(),
            user_id,
            name: "Dra. Marta".into(),
            email: "marta@clinica.pt".into(),
            bio: None,
            specialties: vec![],
            pillars: vec![Pillar::MentalHealth],
            available_weekdays: vec![1, 2, 3, 4, 5],
            is_approved: true,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn only_owner_or_admin_manage_calendar() {
        let owner = Profile::minimal(Uuid::new_v4(), "marta@clinica.pt");
        let p = prestador(Some(owner.id));
        assert!(ensure_manages(&owner, &p).is_ok());

        let stranger = Profile::minimal(Uuid::new_v4(), "x@y.pt");
        assert!(matches!(ensure_manages(&stranger, &p), Err(Error::Forbidden(_))));

        let mut admin = Profile::minimal(Uuid::new_v4(), "admin@y.pt");
        admin.role = Role::Admin;
        assert!(ensure_manages(&admin, &p).is_ok());
    }
}
