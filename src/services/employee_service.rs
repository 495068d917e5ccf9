use std::collections::{HashMap, HashSet};

use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::company_dto::{ImportReport, RowError};
use crate::error::{Error, Result};
use crate::models::employee::CompanyEmployee;
use crate::utils::token::generate_access_code;
use crate::utils::validation::{is_valid_email, normalize_email};

const EMPLOYEE_COLUMNS: &str = "id, company_id, user_id, name, email, access_code, sessions_allocated, \
     sessions_used, registered_at, created_at";

const ACCESS_CODE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub line: usize,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct RosterParse {
    pub rows: Vec<RosterRow>,
    pub errors: Vec<RowError>,
}

fn is_header(name: &str, email: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "name" | "nome")
        && matches!(email.to_lowercase().as_str(), "email" | "e-mail")
}

/// Spreadsheet exports in pt-PT locales use `;` as separator.
fn sniff_delimiter(input: &str) -> u8 {
    let first = input.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    if first.contains(';') && !first.contains(',') {
        b';'
    } else {
        b','
    }
}

/// 1-based line of the record starting at `byte`. The reader places a record
/// after blank lines at the start of those lines, so they are skipped here.
fn line_at(input: &str, byte: u64) -> usize {
    let bytes = input.as_bytes();
    let start = usize::try_from(byte).map_or(bytes.len(), |b| b.min(bytes.len()));
    let blank = bytes[start..]
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .count();
    bytes[..start + blank].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Parses a `name,email` roster. `existing` holds the normalised emails already
/// on the company roster. Rows are checked for required fields, email shape and
/// duplicates against every row accepted before them.
pub fn parse_roster(input: &str, existing: &HashSet<String>) -> RosterParse {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(sniff_delimiter(input))
        .from_reader(input.as_bytes());

    let mut parsed = RosterParse::default();
    let mut accepted: HashMap<String, usize> = HashMap::new();
    let mut first = true;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(0, |p| line_at(input, p.byte()));
                parsed.errors.push(RowError {
                    line,
                    message: format!("Linha ilegível: {}", e),
                });
                continue;
            }
        };
        let line = record.position().map_or(0, |p| line_at(input, p.byte()));
        let name = record.get(0).unwrap_or_default();
        let email = record.get(1).unwrap_or_default();

        if std::mem::take(&mut first) && is_header(name, email) {
            continue;
        }
        if name.is_empty() && email.is_empty() {
            continue;
        }

        let problem = if name.is_empty() {
            Some("Nome em falta.".to_string())
        } else if email.is_empty() {
            Some("Email em falta.".to_string())
        } else if !is_valid_email(email) {
            Some(format!("Email inválido: {}.", email))
        } else {
            let normalized = normalize_email(email);
            if let Some(previous) = accepted.get(&normalized) {
                Some(format!("Email duplicado: {} (linha {}).", email, previous))
            } else if existing.contains(&normalized) {
                Some(format!("Email duplicado: {} já está registado na empresa.", email))
            } else {
                accepted.insert(normalized.clone(), line);
                parsed.rows.push(RosterRow {
                    line,
                    name: name.to_string(),
                    email: normalized,
                });
                None
            }
        };

        if let Some(message) = problem {
            parsed.errors.push(RowError { line, message });
        }
    }

    parsed
}

#[derive(Clone)]
pub struct EmployeeService {
    pool: PgPool,
}

impl EmployeeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<CompanyEmployee>> {
        let query = format!(
            "SELECT {} FROM company_employees WHERE company_id = $1 ORDER BY name",
            EMPLOYEE_COLUMNS
        );
        let items = sqlx::query_as::<_, CompanyEmployee>(&query)
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn roster_emails(&self, company_id: Uuid) -> Result<HashSet<String>> {
        let emails = sqlx::query_scalar::<_, String>(
            "SELECT lower(email) FROM company_employees WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(emails.into_iter().collect())
    }

    /// Inserts every valid row with a fresh access code; invalid rows are
    /// reported with their line number and skipped.
    pub async fn import(&self, company_id: Uuid, csv_text: &str) -> Result<ImportReport> {
        let existing = self.roster_emails(company_id).await?;
        let RosterParse { rows, mut errors } = parse_roster(csv_text, &existing);
        if rows.is_empty() && errors.is_empty() {
            return Err(Error::BadRequest("O ficheiro não tem colaboradores.".into()));
        }

        let query = format!(
            r#"
            INSERT INTO company_employees (company_id, name, email, access_code)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (company_id, email) DO NOTHING
            RETURNING {}
            "#,
            EMPLOYEE_COLUMNS
        );

        let mut tx = self.pool.begin().await?;
        let mut imported = Vec::with_capacity(rows.len());
        for row in rows {
            let inserted = sqlx::query_as::<_, CompanyEmployee>(&query)
                .bind(company_id)
                .bind(&row.name)
                .bind(&row.email)
                .bind(generate_access_code(ACCESS_CODE_LEN))
                .fetch_optional(&mut *tx)
                .await?;
            match inserted {
                Some(employee) => imported.push(employee),
                None => errors.push(RowError {
                    line: row.line,
                    message: format!("Email duplicado: {} já está registado na empresa.", row.email),
                }),
            }
        }
        tx.commit().await?;

        errors.sort_by_key(|e| e.line);
        tracing::info!(
            %company_id,
            imported = imported.len(),
            rejected = errors.len(),
            "Roster imported"
        );
        Ok(ImportReport { imported, errors })
    }

    pub async fn set_allocation(&self, company_id: Uuid, employee_id: Uuid, allocated: i32) -> Result<CompanyEmployee> {
        let query = format!(
            "UPDATE company_employees SET sessions_allocated = $3
             WHERE id = $1 AND company_id = $2 AND ($3 = 0 OR sessions_used <= $3)
             RETURNING {}",
            EMPLOYEE_COLUMNS
        );
        let updated = sqlx::query_as::<_, CompanyEmployee>(&query)
            .bind(employee_id)
            .bind(company_id)
            .bind(allocated)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(employee) = updated {
            return Ok(employee);
        }

        let used = self.sessions_used(company_id, employee_id).await?;
        Err(Error::BadRequest(format!(
            "O colaborador já utilizou {} sessões; a atribuição não pode ser inferior.",
            used
        )))
    }

    async fn sessions_used(&self, company_id: Uuid, employee_id: Uuid) -> Result<i32> {
        sqlx::query_scalar::<_, i32>(
            "SELECT sessions_used FROM company_employees WHERE id = $1 AND company_id = $2",
        )
        .bind(employee_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Colaborador não encontrado.".into()))
    }

    /// Only employees who have not redeemed their code can be removed.
    pub async fn remove(&self, company_id: Uuid, employee_id: Uuid) -> Result<()> {
        let registered = sqlx::query_scalar::<_, bool>(
            "SELECT registered_at IS NOT NULL FROM company_employees WHERE id = $1 AND company_id = $2",
        )
        .bind(employee_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Colaborador não encontrado.".into()))?;
        if registered {
            return Err(Error::Conflict(
                "O colaborador já criou conta e não pode ser removido.".into(),
            ));
        }

        sqlx::query("DELETE FROM company_employees WHERE id = $1 AND company_id = $2")
            .bind(employee_id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        tracing::info!(%company_id, %employee_id, "Employee removed from roster");
        Ok(())
    }
}
