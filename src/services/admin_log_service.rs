use std::net::IpAddr;

use axum::http::HeaderMap;
use serde_json::Value as JsonValue;
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::admin_log::AdminLog;

/// Request origin recorded with each admin action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOrigin {
    pub ip: Option<IpNetwork>,
    pub user_agent: Option<String>,
}

impl RequestOrigin {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
            .map(IpNetwork::from);
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self { ip, user_agent }
    }
}

#[derive(Clone)]
pub struct AdminLogService {
    pool: PgPool,
}

impl AdminLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log(
        &self,
        admin_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: Option<JsonValue>,
        origin: &RequestOrigin,
    ) -> Result<AdminLog> {
        let row = sqlx::query_as::<_, AdminLog>(
            r#"
            INSERT INTO admin_logs (admin_id, action, entity_type, entity_id, details, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, admin_id, action, entity_type, entity_id, details, ip_address, user_agent, created_at
            "#,
        )
        .bind(admin_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(details)
        .bind(origin.ip)
        .bind(origin.user_agent.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Logging never fails the admin action it describes.
    pub async fn record(
        &self,
        admin_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        details: Option<JsonValue>,
        origin: &RequestOrigin,
    ) {
        if let Err(e) = self
            .log(admin_id, action, entity_type, entity_id, details, origin)
            .await
        {
            tracing::warn!(%admin_id, action, error = ?e, "Failed to write admin log");
        }
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<AdminLog>> {
        let limit = if limit <= 0 { 100 } else { limit.min(500) };
        let rows = sqlx::query_as::<_, AdminLog>(
            r#"
            SELECT id, admin_id, action, entity_type, entity_id, details, ip_address, user_agent, created_at
            FROM admin_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
