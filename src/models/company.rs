use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub nif: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub sessions_allocated: i32,
    pub sessions_used: i32,
    pub contract_start_date: Option<NaiveDate>,
    pub contract_end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Company {
    pub fn sessions_remaining(&self) -> i32 {
        (self.sessions_allocated - self.sessions_used).max(0)
    }

    pub fn contract_covers(&self, day: NaiveDate) -> bool {
        let started = self.contract_start_date.map_or(true, |start| start <= day);
        let not_ended = self.contract_end_date.map_or(true, |end| day <= end);
        started && not_ended
    }

    /// Active, under contract on `day`, with a session left beyond the
    /// `pending` ones already booked.
    pub fn can_fund_session(&self, day: NaiveDate, pending: i32) -> bool {
        self.is_active && self.contract_covers(day) && self.sessions_remaining() > pending
    }
}
