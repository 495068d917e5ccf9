use crate::error::Result;
use crate::models::notification::Notification;
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Writes user notifications to the outbox table. Delivery (email, push) is
/// handled outside this service.
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        message: &str,
        payload: Option<JsonValue>,
    ) -> Result<Notification> {
        insert(&self.pool, user_id, kind, title, message, payload).await
    }

    /// Best-effort variant for side notifications that must not fail the caller.
    pub async fn notify_quietly(
        &self,
        user_id: Uuid,
        kind: &str,
        title: &str,
        message: &str,
        payload: Option<JsonValue>,
    ) {
        if let Err(e) = self.notify(user_id, kind, title, message, payload).await {
            tracing::warn!(%user_id, kind, error = ?e, "Failed to enqueue notification");
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let limit = if limit <= 0 { 50 } else { limit.min(200) };
        let items = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, kind, title, message, payload, read_at, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification> {
        let item = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, kind, title, message, payload, read_at, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }
}

pub async fn insert<'e, E>(
    executor: E,
    user_id: Uuid,
    kind: &str,
    title: &str,
    message: &str,
    payload: Option<JsonValue>,
) -> Result<Notification>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (user_id, kind, title, message, payload)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, kind, title, message, payload, read_at, created_at
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(title)
    .bind(message)
    .bind(payload)
    .fetch_one(executor)
    .await?;
    Ok(row)
}
