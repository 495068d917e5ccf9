use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::company_dto::{
    CompanyUsage, CreateCompanyPayload, PillarUsage, UpdateCompanyPayload,
};
use crate::error::{is_unique_violation, Error, Result};
use crate::models::company::Company;
use crate::models::pillar::Pillar;
use crate::models::profile::{Profile, Role};

const COMPANY_COLUMNS: &str = "id, name, nif, email, phone, sessions_allocated, sessions_used, \
     contract_start_date, contract_end_date, is_active, created_at, updated_at";

/// HR users reach only their own company; admins reach all.
pub fn ensure_company_access(caller: &Profile, company_id: Uuid) -> Result<()> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Hr if caller.company_id == Some(company_id) => Ok(()),
        _ => Err(Error::Forbidden("Sem acesso a esta empresa.".into())),
    }
}

fn nif_conflict(err: sqlx::Error) -> Error {
    if is_unique_violation(&err) {
        Error::Conflict("Já existe uma empresa com este NIF.".into())
    } else {
        err.into()
    }
}

#[derive(Clone)]
pub struct CompanyService {
    pool: PgPool,
}

impl CompanyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Company>> {
        let query = format!("SELECT {} FROM companies ORDER BY name", COMPANY_COLUMNS);
        let items = sqlx::query_as::<_, Company>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<Company> {
        let query = format!("SELECT {} FROM companies WHERE id = $1", COMPANY_COLUMNS);
        sqlx::query_as::<_, Company>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Empresa não encontrada.".into()))
    }

    pub async fn create(&self, payload: CreateCompanyPayload) -> Result<Company> {
        let query = format!(
            r#"
            INSERT INTO companies (name, nif, email, phone, sessions_allocated, contract_start_date, contract_end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            COMPANY_COLUMNS
        );
        let company = sqlx::query_as::<_, Company>(&query)
            .bind(payload.name.trim())
            .bind(payload.nif.trim())
            .bind(payload.email)
            .bind(payload.phone)
            .bind(payload.sessions_allocated)
            .bind(payload.contract_start_date)
            .bind(payload.contract_end_date)
            .fetch_one(&self.pool)
            .await
            .map_err(nif_conflict)?;
        tracing::info!(company_id = %company.id, "Company created");
        Ok(company)
    }

    pub async fn update(&self, id: Uuid, payload: UpdateCompanyPayload) -> Result<Company> {
        let current = self.get(id).await?;
        let allocated = payload.sessions_allocated.unwrap_or(current.sessions_allocated);
        if allocated < current.sessions_used {
            return Err(Error::BadRequest(format!(
                "A empresa já utilizou {} sessões; a alocação não pode ser inferior.",
                current.sessions_used
            )));
        }
        let start = payload.contract_start_date.or(current.contract_start_date);
        let end = payload.contract_end_date.or(current.contract_end_date);
        if matches!((start, end), (Some(s), Some(e)) if e < s) {
            return Err(Error::BadRequest(
                "A data de fim do contrato é anterior à data de início.".into(),
            ));
        }

        let query = format!(
            r#"
            UPDATE companies
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                sessions_allocated = $5,
                contract_start_date = $6,
                contract_end_date = $7,
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            COMPANY_COLUMNS
        );
        let company = sqlx::query_as::<_, Company>(&query)
            .bind(id)
            .bind(payload.name)
            .bind(payload.email)
            .bind(payload.phone)
            .bind(allocated)
            .bind(start)
            .bind(end)
            .bind(payload.is_active)
            .fetch_one(&self.pool)
            .await?;
        Ok(company)
    }

    /// Companies with booking history are deactivated instead of removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let has_bookings = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE company_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if has_bookings {
            let updated = sqlx::query("UPDATE companies SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if updated.rows_affected() == 0 {
                return Err(Error::NotFound("Empresa não encontrada.".into()));
            }
            tracing::info!(company_id = %id, "Company deactivated");
            return Ok(false);
        }

        let deleted = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(Error::NotFound("Empresa não encontrada.".into()));
        }
        tracing::info!(company_id = %id, "Company deleted");
        Ok(true)
    }

    pub async fn usage(&self, id: Uuid) -> Result<CompanyUsage> {
        let company = self.get(id).await?;

        let (employees, registered_employees) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(user_id)
            FROM company_employees WHERE company_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, (Pillar, i64, i64)>(
            r#"
            SELECT pillar,
                   COUNT(*) FILTER (WHERE status = 'completed'),
                   COUNT(*) FILTER (WHERE status IN ('scheduled', 'confirmed') AND booking_date >= CURRENT_DATE)
            FROM bookings
            WHERE company_id = $1
            GROUP BY pillar
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let by_pillar = Pillar::ALL
            .into_iter()
            .map(|pillar| {
                let (completed, upcoming) = rows
                    .iter()
                    .find(|(p, _, _)| *p == pillar)
                    .map_or((0, 0), |(_, c, u)| (*c, *u));
                PillarUsage {
                    pillar,
                    label: pillar.label(),
                    completed,
                    upcoming,
                }
            })
            .collect();

        Ok(CompanyUsage {
            sessions_remaining: company.sessions_remaining(),
            company,
            employees,
            registered_employees,
            by_pillar,
        })
    }
}
