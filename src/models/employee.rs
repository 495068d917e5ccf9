use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyEmployee {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub access_code: String,
    pub sessions_allocated: i32,
    pub sessions_used: i32,
    pub registered_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CompanyEmployee {
    /// An allocation of zero means the employee draws from the company pool only.
    pub fn has_quota_left(&self, pending: i32) -> bool {
        self.sessions_allocated == 0 || self.sessions_used + pending < self.sessions_allocated
    }
}
