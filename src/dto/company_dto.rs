use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::company::Company;
use crate::models::employee::CompanyEmployee;
use crate::models::pillar::Pillar;

fn validate_nif(nif: &str) -> Result<(), ValidationError> {
    let digits = nif.trim();
    if digits.len() == 9 && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("nif").with_message("O NIF deve ter 9 dígitos.".into()))
    }
}

fn contract_dates_ordered(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(ValidationError::new("contract_dates")
            .with_message("A data de fim do contrato é anterior à data de início.".into())),
        _ => Ok(()),
    }
}

fn create_dates(payload: &CreateCompanyPayload) -> Result<(), ValidationError> {
    contract_dates_ordered(payload.contract_start_date, payload.contract_end_date)
}

fn update_dates(payload: &UpdateCompanyPayload) -> Result<(), ValidationError> {
    contract_dates_ordered(payload.contract_start_date, payload.contract_end_date)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "create_dates"))]
pub struct CreateCompanyPayload {
    #[validate(length(min = 2, max = 200, message = "Indique o nome da empresa."))]
    pub name: String,
    #[validate(custom(function = "validate_nif"))]
    pub nif: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub sessions_allocated: i32,
    pub contract_start_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "update_dates"))]
pub struct UpdateCompanyPayload {
    #[validate(length(min = 2, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(range(min = 0))]
    pub sessions_allocated: Option<i32>,
    pub contract_start_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PillarUsage {
    pub pillar: Pillar,
    pub label: &'static str,
    pub completed: i64,
    pub upcoming: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyUsage {
    pub company: Company,
    pub sessions_remaining: i32,
    pub employees: i64,
    pub registered_employees: i64,
    pub by_pillar: Vec<PillarUsage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based line in the uploaded file.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub imported: Vec<CompanyEmployee>,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportQuery {
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateEmployeePayload {
    #[validate(range(min = 0))]
    pub sessions_allocated: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nif_must_be_nine_digits() {
        assert!(validate_nif("501234567").is_ok());
        assert!(validate_nif("50123456").is_err());
        assert!(validate_nif("50123456A").is_err());
    }

    #[test]
    fn contract_end_cannot_precede_start() {
        let payload = CreateCompanyPayload {
            name: "Acme Lda".into(),
            nif: "501234567".into(),
            email: None,
            phone: None,
            sessions_allocated: 10,
            contract_start_date: NaiveDate::from_ymd_opt(2026, 6, 1),
            contract_end_date: NaiveDate::from_ymd_opt(2026, 1, 1),
        };
        assert!(payload.validate().is_err());
    }
}
