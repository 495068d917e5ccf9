use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::pillar::Pillar;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prestador {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub specialties: Vec<String>,
    pub pillars: Vec<Pillar>,
    /// ISO weekdays, 1 = Monday.
    pub available_weekdays: Vec<i16>,
    pub is_approved: bool,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Prestador {
    pub fn serves(&self, pillar: Pillar) -> bool {
        self.pillars.contains(&pillar)
    }

    pub fn is_bookable(&self) -> bool {
        self.is_approved && self.is_active
    }

    pub fn works_on(&self, day: NaiveDate) -> bool {
        let weekday = day.weekday().number_from_monday() as i16;
        self.available_weekdays.contains(&weekday)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlockedDate {
    pub id: Uuid,
    pub prestador_id: Uuid,
    pub blocked_date: NaiveDate,
    /// `None` blocks the whole day.
    pub blocked_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
