use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::booking::BookingStatus;
use crate::models::prestador::{BlockedDate, Prestador};
use crate::utils::time::{format_slot, hourly_grid};

/// Blocked entries for one provider and one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blocked {
    pub whole_day: bool,
    pub times: BTreeSet<NaiveTime>,
}

impl Blocked {
    pub fn from_rows(rows: &[BlockedDate]) -> Self {
        let mut blocked = Blocked::default();
        for row in rows {
            match row.blocked_time {
                Some(t) => {
                    blocked.times.insert(t);
                }
                None => blocked.whole_day = true,
            }
        }
        blocked
    }

    pub fn day() -> Self {
        Self {
            whole_day: true,
            times: BTreeSet::new(),
        }
    }
}

/// `grid − blocked − booked`, in grid order.
pub fn available_slots(
    grid: &[NaiveTime],
    blocked: &Blocked,
    booked: &BTreeSet<NaiveTime>,
) -> Vec<NaiveTime> {
    if blocked.whole_day {
        return Vec::new();
    }
    grid.iter()
        .copied()
        .filter(|t| !blocked.times.contains(t) && !booked.contains(t))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub prestador_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<String>,
}

#[derive(Clone)]
pub struct AvailabilityService {
    pool: PgPool,
    grid: Vec<NaiveTime>,
}

impl AvailabilityService {
    pub fn new(pool: PgPool, start_hour: u32, end_hour: u32) -> Self {
        Self {
            pool,
            grid: hourly_grid(start_hour, end_hour),
        }
    }

    pub fn grid(&self) -> &[NaiveTime] {
        &self.grid
    }

    pub async fn blocked_rows(&self, prestador_id: Uuid, date: NaiveDate) -> Result<Vec<BlockedDate>> {
        let rows = sqlx::query_as::<_, BlockedDate>(
            r#"
            SELECT id, prestador_id, blocked_date, blocked_time, reason, created_at
            FROM prestador_blocked_dates
            WHERE prestador_id = $1 AND blocked_date = $2
            "#,
        )
        .bind(prestador_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn booked_times(&self, prestador_id: Uuid, date: NaiveDate) -> Result<BTreeSet<NaiveTime>> {
        let times = sqlx::query_scalar::<_, NaiveTime>(
            r#"
            SELECT start_time FROM bookings
            WHERE prestador_id = $1 AND booking_date = $2 AND status = ANY($3)
            "#,
        )
        .bind(prestador_id)
        .bind(date)
        .bind(BookingStatus::ACTIVE.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(times.into_iter().collect())
    }

    pub async fn slots_for(&self, prestador: &Prestador, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        let blocked = if prestador.works_on(date) {
            Blocked::from_rows(&self.blocked_rows(prestador.id, date).await?)
        } else {
            Blocked::day()
        };
        if blocked.whole_day {
            return Ok(Vec::new());
        }
        let booked = self.booked_times(prestador.id, date).await?;
        Ok(available_slots(&self.grid, &blocked, &booked))
    }

    pub async fn is_available(&self, prestador: &Prestador, date: NaiveDate, time: NaiveTime) -> Result<bool> {
        Ok(self.slots_for(prestador, date).await?.contains(&time))
    }

    pub async fn availability(&self, prestador: &Prestador, date: NaiveDate) -> Result<AvailabilityResponse> {
        let slots = self.slots_for(prestador, date).await?;
        Ok(AvailabilityResponse {
            prestador_id: prestador.id,
            date,
            slots: slots.into_iter().map(format_slot).collect(),
        })
    }
}
