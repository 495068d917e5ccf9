use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::pillar::Pillar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl PgHasArrayType for BookingStatus {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_booking_status")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payer_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayerSource {
    Company,
    Personal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meeting_platform", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeetingPlatform {
    Zoom,
    GoogleMeet,
    Teams,
    Phone,
    InPerson,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("booking is already {0:?}")]
    Terminal(BookingStatus),
    #[error("cannot move a booking from {from:?} to {to:?}")]
    NotAllowed {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("booking quota was already deducted")]
    AlreadyDeducted,
}

/// Outcome of a legal status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next: BookingStatus,
    pub deduct: bool,
}

impl BookingStatus {
    pub const ACTIVE: [BookingStatus; 3] = [
        BookingStatus::Scheduled,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Cancelled
                | BookingStatus::NoShow
                | BookingStatus::Rescheduled
        )
    }

    /// Whether a booking in this status holds its provider slot.
    pub fn occupies_slot(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Every status change goes through here. A quota unit is consumed exactly
    /// when the booking enters `completed`; no other target deducts.
    pub fn plan_transition(
        self,
        next: BookingStatus,
        already_deducted: bool,
    ) -> Result<TransitionPlan, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }

        let allowed = match self {
            BookingStatus::Scheduled => matches!(
                next,
                BookingStatus::Confirmed
                    | BookingStatus::Completed
                    | BookingStatus::Cancelled
                    | BookingStatus::NoShow
                    | BookingStatus::Rescheduled
            ),
            BookingStatus::Confirmed => matches!(
                next,
                BookingStatus::Completed
                    | BookingStatus::Cancelled
                    | BookingStatus::NoShow
                    | BookingStatus::Rescheduled
            ),
            _ => false,
        };
        if !allowed {
            return Err(TransitionError::NotAllowed { from: self, to: next });
        }

        let deduct = next == BookingStatus::Completed;
        if deduct && already_deducted {
            return Err(TransitionError::AlreadyDeducted);
        }

        Ok(TransitionPlan { next, deduct })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prestador_id: Uuid,
    pub company_id: Option<Uuid>,
    pub booked_by: Option<Uuid>,
    pub pillar: Pillar,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub status: BookingStatus,
    pub payer_source: PayerSource,
    pub meeting_platform: Option<MeetingPlatform>,
    pub meeting_link: Option<String>,
    pub topic: Option<String>,
    pub notes: Option<String>,
    pub session_notes: Option<String>,
    pub rating: Option<i16>,
    pub feedback: Option<String>,
    pub was_deducted: bool,
    pub deducted_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub rescheduled_from: Option<Uuid>,
    pub chat_session_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// `was_deducted` holds exactly for completed bookings with a deduction timestamp.
    pub fn deduction_consistent(&self) -> bool {
        let expected = self.status == BookingStatus::Completed && self.deducted_at.is_some();
        self.was_deducted == expected
    }

    pub fn without_clinical_notes(mut self) -> Self {
        self.session_notes = None;
        self
    }

    pub fn is_referral(&self) -> bool {
        self.booked_by.is_some_and(|by| by != self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 6] = [
        BookingStatus::Scheduled,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
        BookingStatus::Rescheduled,
    ];

    fn sample(status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            prestador_id: Uuid::new_v4(),
            company_id: None,
            booked_by: None,
            pillar: Pillar::MentalHealth,
            booking_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status,
            payer_source: PayerSource::Company,
            meeting_platform: None,
            meeting_link: None,
            topic: None,
            notes: None,
            session_notes: None,
            rating: None,
            feedback: None,
            was_deducted: false,
            deducted_at: None,
            cancellation_reason: None,
            cancelled_at: None,
            rescheduled_from: None,
            chat_session_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn only_completion_deducts() {
        for from in [BookingStatus::Scheduled, BookingStatus::Confirmed] {
            for to in ALL {
                if let Ok(plan) = from.plan_transition(to, false) {
                    assert_eq!(plan.deduct, to == BookingStatus::Completed, "{from:?} -> {to:?}");
                }
            }
        }
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert_eq!(
                    from.plan_transition(to, false),
                    Err(TransitionError::Terminal(from))
                );
            }
        }
    }

    #[test]
    fn confirmed_cannot_go_back_to_scheduled() {
        assert_eq!(
            BookingStatus::Confirmed.plan_transition(BookingStatus::Scheduled, false),
            Err(TransitionError::NotAllowed {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Scheduled,
            })
        );
    }

    #[test]
    fn double_deduction_is_refused() {
        assert_eq!(
            BookingStatus::Confirmed.plan_transition(BookingStatus::Completed, true),
            Err(TransitionError::AlreadyDeducted)
        );
    }

    #[test]
    fn non_completed_bookings_must_not_be_deducted() {
        for status in [
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
            BookingStatus::Rescheduled,
        ] {
            let mut booking = sample(status);
            assert!(booking.deduction_consistent());
            booking.was_deducted = true;
            booking.deducted_at = Some(Utc::now());
            assert!(!booking.deduction_consistent());
        }
    }

    #[test]
    fn completed_with_timestamp_must_be_deducted() {
        let mut booking = sample(BookingStatus::Completed);
        booking.deducted_at = Some(Utc::now());
        assert!(!booking.deduction_consistent());
        booking.was_deducted = true;
        assert!(booking.deduction_consistent());
    }

    #[test]
    fn status_arrays_use_the_enum_array_type() {
        use sqlx::TypeInfo;
        assert_eq!(BookingStatus::array_type_info().name(), "_booking_status");
    }

    #[test]
    fn referral_means_booked_by_someone_else() {
        let mut booking = sample(BookingStatus::Scheduled);
        assert!(!booking.is_referral());
        booking.booked_by = Some(booking.user_id);
        assert!(!booking.is_referral());
        booking.booked_by = Some(Uuid::new_v4());
        assert!(booking.is_referral());
    }
}
