use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::chat::{ChatMessage, ChatSession};

/// Read side of the pre-diagnostic chat.
#[derive(Clone)]
pub struct ChatService {
    pool: PgPool,
}

impl ChatService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn transcript(&self, session_id: Uuid) -> Result<(ChatSession, Vec<ChatMessage>)> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT id, user_id, pillar, status, created_at, ended_at FROM chat_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Conversa não encontrada.".into()))?;

        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok((session, messages))
    }

    /// Chat sessions can only be attached to bookings of the same user.
    pub async fn belongs_to(&self, session_id: Uuid, user_id: Uuid) -> Result<bool> {
        let owner = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM chat_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner == Some(user_id))
    }
}
