use bytes::Bytes;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::resource_dto::{CreateResourcePayload, ResourceQuery, UpdateResourcePayload};
use crate::error::{Error, Result};
use crate::models::profile::{Profile, Role};
use crate::models::resource::Resource;
use crate::services::storage_service::StorageService;

const RESOURCE_COLUMNS: &str = "id, title, description, pillar, resource_type, content_url, thumbnail_url, \
     is_premium, is_active, created_by, created_at, updated_at";

/// Premium content is part of company plans; staff always see it.
pub fn sees_premium(caller: &Profile) -> bool {
    caller.role != Role::User || caller.company_id.is_some()
}

#[derive(Clone)]
pub struct ResourceService {
    pool: PgPool,
    storage: StorageService,
}

impl ResourceService {
    pub fn new(pool: PgPool, storage: StorageService) -> Self {
        Self { pool, storage }
    }

    pub async fn list(&self, caller: &Profile, filter: ResourceQuery) -> Result<Vec<Resource>> {
        let admin = caller.role == Role::Admin;
        let query = format!(
            r#"
            SELECT {} FROM resources
            WHERE ($1 OR is_active)
              AND ($2 OR NOT is_premium)
              AND ($3::pillar IS NULL OR pillar = $3)
              AND ($4::resource_type IS NULL OR resource_type = $4)
            ORDER BY created_at DESC
            "#,
            RESOURCE_COLUMNS
        );
        let items = sqlx::query_as::<_, Resource>(&query)
            .bind(admin)
            .bind(sees_premium(caller))
            .bind(filter.pillar)
            .bind(filter.resource_type)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn get(&self, id: Uuid) -> Result<Resource> {
        let query = format!("SELECT {} FROM resources WHERE id = $1", RESOURCE_COLUMNS);
        sqlx::query_as::<_, Resource>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Recurso não encontrado.".into()))
    }

    pub async fn get_for(&self, caller: &Profile, id: Uuid) -> Result<Resource> {
        let resource = self.get(id).await?;
        let hidden = (!resource.is_active && caller.role != Role::Admin)
            || (resource.is_premium && !sees_premium(caller));
        if hidden {
            return Err(Error::NotFound("Recurso não encontrado.".into()));
        }
        Ok(resource)
    }

    pub async fn create(&self, created_by: Uuid, payload: CreateResourcePayload) -> Result<Resource> {
        let query = format!(
            r#"
            INSERT INTO resources (title, description, pillar, resource_type, content_url, is_premium, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        );
        let resource = sqlx::query_as::<_, Resource>(&query)
            .bind(payload.title.trim())
            .bind(payload.description)
            .bind(payload.pillar)
            .bind(payload.resource_type)
            .bind(payload.content_url)
            .bind(payload.is_premium)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(resource)
    }

    pub async fn update(&self, id: Uuid, payload: UpdateResourcePayload) -> Result<Resource> {
        let query = format!(
            r#"
            UPDATE resources
            SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                pillar = COALESCE($4, pillar),
                resource_type = COALESCE($5, resource_type),
                content_url = COALESCE($6, content_url),
                is_premium = COALESCE($7, is_premium),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        );
        sqlx::query_as::<_, Resource>(&query)
            .bind(id)
            .bind(payload.title)
            .bind(payload.description)
            .bind(payload.pillar)
            .bind(payload.resource_type)
            .bind(payload.content_url)
            .bind(payload.is_premium)
            .bind(payload.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Recurso não encontrado.".into()))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let thumbnail = sqlx::query_scalar::<_, Option<String>>(
            "DELETE FROM resources WHERE id = $1 RETURNING thumbnail_url",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Recurso não encontrado.".into()))?;

        if let Some(url) = thumbnail {
            self.storage.remove_by_url(&url).await;
        }
        Ok(())
    }

    /// Uploads a new thumbnail and drops the one it replaces.
    pub async fn set_thumbnail(&self, id: Uuid, filename: &str, data: &Bytes) -> Result<String> {
        let previous = self.get(id).await?.thumbnail_url;
        let url = self.storage.save_thumbnail(filename, data).await?;

        let linked = sqlx::query("UPDATE resources SET thumbnail_url = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(&url)
            .execute(&self.pool)
            .await;
        self.storage.keep_or_remove(&url, linked).await?;

        if let Some(old) = previous {
            self.storage.remove_by_url(&old).await;
        }
        tracing::info!(resource_id = %id, "Thumbnail updated");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_needs_a_company_plan() {
        let mut user = Profile::minimal(Uuid::new_v4(), "u@x.pt");
        assert!(!sees_premium(&user));
        user.company_id = Some(Uuid::new_v4());
        assert!(sees_premium(&user));

        let mut specialist = Profile::minimal(Uuid::new_v4(), "e@x.pt");
        specialist.role = Role::Specialist;
        assert!(sees_premium(&specialist));
    }
}
