use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::company_dto::{
        CreateCompanyPayload, ExportFormat, ExportQuery, UpdateCompanyPayload,
        UpdateEmployeePayload,
    },
    error::{Error, Result},
    middleware::auth::CurrentUser,
    services::{
        admin_log_service::RequestOrigin, company_service::ensure_company_access,
        export_service::ExportService,
    },
    AppState,
};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "empresa".to_string()
    } else {
        stem.to_string()
    }
}

#[axum::debug_handler]
pub async fn admin_list_companies(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let items = state.company_service.list().await?;
    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/api/admin/companies",
    request_body = CreateCompanyPayload,
    responses(
        (status = 201, description = "Company created"),
        (status = 400, description = "Invalid NIF or contract dates"),
        (status = 409, description = "NIF already registered")
    )
)]
#[axum::debug_handler]
pub async fn admin_create_company(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Json(payload): Json<CreateCompanyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let company = state.company_service.create(payload).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "company.create",
            "company",
            Some(company.id),
            Some(json!({ "name": company.name, "nif": company.nif })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok((StatusCode::CREATED, Json(company)))
}

#[axum::debug_handler]
pub async fn admin_update_company(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCompanyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let company = state.company_service.update(id, payload).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            "company.update",
            "company",
            Some(id),
            Some(json!({
                "sessions_allocated": company.sessions_allocated,
                "is_active": company.is_active,
            })),
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok(Json(company))
}

#[axum::debug_handler]
pub async fn admin_delete_company(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let deleted = state.company_service.delete(id).await?;
    state
        .admin_log_service
        .record(
            user.id(),
            if deleted { "company.delete" } else { "company.deactivate" },
            "company",
            Some(id),
            None,
            &RequestOrigin::from_headers(&headers),
        )
        .await;
    Ok(Json(json!({ "deleted": deleted, "deactivated": !deleted })))
}

#[axum::debug_handler]
pub async fn get_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    ensure_company_access(&user.0, id)?;
    let company = state.company_service.get(id).await?;
    Ok(Json(company))
}

#[utoipa::path(
    get,
    path = "/api/companies/{id}/usage",
    params(("id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Quota and per-pillar usage"),
        (status = 403, description = "Not the caller's company")
    )
)]
#[axum::debug_handler]
pub async fn company_usage(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    ensure_company_access(&user.0, id)?;
    let usage = state.company_service.usage(id).await?;
    Ok(Json(usage))
}

#[axum::debug_handler]
pub async fn list_employees(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    ensure_company_access(&user.0, id)?;
    let items = state.employee_service.list(id).await?;
    Ok(Json(items))
}

/// Reads the roster from a multipart `file` field or a raw `text/csv` body.
async fn roster_text(state: &AppState, req: Request) -> Result<String> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        return String::from_request(req, state)
            .await
            .map_err(|_| Error::BadRequest("O ficheiro deve estar em UTF-8.".into()));
    }

    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| Error::BadRequest(e.body_text()))?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            return field
                .text()
                .await
                .map_err(|_| Error::BadRequest("O ficheiro deve estar em UTF-8.".into()));
        }
    }
    Err(Error::BadRequest("Envie o ficheiro CSV no campo \"file\".".into()))
}

#[utoipa::path(
    post,
    path = "/api/companies/{id}/employees/import",
    params(("id" = Uuid, Path, description = "Company id")),
    responses(
        (status = 200, description = "Imported rows and line-numbered errors"),
        (status = 400, description = "File missing or unreadable")
    )
)]
#[axum::debug_handler]
pub async fn import_employees(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    req: Request,
) -> Result<impl IntoResponse> {
    ensure_company_access(&user.0, id)?;
    let origin = RequestOrigin::from_headers(req.headers());
    let text = roster_text(&state, req).await?;
    if text.trim().is_empty() {
        return Err(Error::BadRequest("O ficheiro está vazio.".into()));
    }

    let report = state.employee_service.import(id, &text).await?;
    if user.is_admin() {
        state
            .admin_log_service
            .record(
                user.id(),
                "employees.import",
                "company",
                Some(id),
                Some(json!({ "imported": report.imported.len(), "errors": report.errors.len() })),
                &origin,
            )
            .await;
    }
    Ok(Json(report))
}

#[axum::debug_handler]
pub async fn export_employees(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse> {
    ensure_company_access(&user.0, id)?;
    let company = state.company_service.get(id).await?;
    let employees = state.employee_service.list(id).await?;

    let (buffer, content_type, ext) = match query.format {
        ExportFormat::Csv => (
            ExportService::roster_csv(&employees)?,
            "text/csv; charset=utf-8",
            "csv",
        ),
        ExportFormat::Xlsx => (
            ExportService::roster_xlsx(&company, &employees)?,
            XLSX_CONTENT_TYPE,
            "xlsx",
        ),
    };
    let filename = format!(
        "colaboradores_{}_{}.{}",
        file_stem(&company.name),
        chrono::Utc::now().format("%Y%m%d"),
        ext
    );
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}

#[axum::debug_handler]
pub async fn update_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, employee_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateEmployeePayload>,
) -> Result<impl IntoResponse> {
    ensure_company_access(&user.0, id)?;
    payload.validate()?;
    let employee = state
        .employee_service
        .set_allocation(id, employee_id, payload.sessions_allocated)
        .await?;
    Ok(Json(employee))
}

#[axum::debug_handler]
pub async fn remove_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, employee_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    ensure_company_access(&user.0, id)?;
    state.employee_service.remove(id, employee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_file_names_are_ascii() {
        assert_eq!(file_stem("Acme, Lda."), "acme__lda");
        assert_eq!(file_stem("Café"), "caf");
        assert_eq!(file_stem("***"), "empresa");
    }
}
