use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::pillar::Pillar;

fn iso_weekdays(days: &[i16]) -> Result<(), ValidationError> {
    if days.iter().all(|d| (1..=7).contains(d)) {
        Ok(())
    } else {
        Err(ValidationError::new("available_weekdays")
            .with_message("Dias da semana devem estar entre 1 (segunda) e 7 (domingo).".into()))
    }
}

fn at_least_one_pillar(pillars: &[Pillar]) -> Result<(), ValidationError> {
    if pillars.is_empty() {
        Err(ValidationError::new("pillars").with_message("Indique pelo menos um pilar.".into()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePrestadorPayload {
    /// Existing account that becomes the provider.
    pub user_id: Uuid,
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 4000))]
    pub bio: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[validate(custom(function = "at_least_one_pillar"))]
    pub pillars: Vec<Pillar>,
    #[validate(custom(function = "iso_weekdays"))]
    pub available_weekdays: Option<Vec<i16>>,
    #[serde(default)]
    pub is_approved: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePrestadorPayload {
    #[validate(length(min = 2, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 4000))]
    pub bio: Option<String>,
    pub specialties: Option<Vec<String>>,
    #[validate(custom(function = "at_least_one_pillar"))]
    pub pillars: Option<Vec<Pillar>>,
    #[validate(custom(function = "iso_weekdays"))]
    pub available_weekdays: Option<Vec<i16>>,
    pub is_approved: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrestadorListQuery {
    pub pillar: Option<Pillar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BlockDatePayload {
    pub date: NaiveDate,
    /// Omitted to block the whole day.
    pub time: Option<NaiveTime>,
    #[validate(length(max = 300))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockedDatesQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
