use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::booking::{Booking, BookingStatus, MeetingPlatform, PayerSource};
use crate::models::chat::{ChatMessage, ChatSession};
use crate::models::pillar::Pillar;
use crate::services::booking_wizard::{BookingDraft, WizardFlow, WizardPosition, WizardStep};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingPayload {
    pub prestador_id: Uuid,
    pub pillar: Pillar,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub payer_source: PayerSource,
    pub meeting_platform: MeetingPlatform,
    #[validate(length(min = 1, max = 200, message = "Indique o tema da sessão."))]
    pub topic: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub chat_session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReferralPayload {
    pub company_id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub booking: CreateBookingPayload,
}

impl CreateBookingPayload {
    pub fn draft(&self) -> BookingDraft {
        BookingDraft {
            pillar: Some(self.pillar),
            prestador_id: Some(self.prestador_id),
            date: Some(self.date),
            time: Some(self.time),
            topic: Some(self.topic.clone()),
            notes: self.notes.clone(),
            meeting_platform: Some(self.meeting_platform),
            payer_source: Some(self.payer_source),
            ..Default::default()
        }
    }
}

impl ReferralPayload {
    pub fn draft(&self) -> BookingDraft {
        BookingDraft {
            company_id: Some(self.company_id),
            user_id: Some(self.user_id),
            ..self.booking.draft()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WizardAdvancePayload {
    pub flow: WizardFlow,
    pub step: WizardStep,
    /// `back` moves one step back instead of forward.
    #[serde(default)]
    pub direction: WizardDirection,
    #[serde(default)]
    pub draft: BookingDraft,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardDirection {
    #[default]
    Forward,
    Back,
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardAdvanceResponse {
    pub position: WizardPosition,
    pub ready_to_submit: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransitionPayload {
    pub status: BookingStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReschedulePayload {
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleResponse {
    pub previous: Booking,
    pub booking: Booking,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RatingPayload {
    #[validate(range(min = 1, max = 5, message = "A avaliação deve estar entre 1 e 5."))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SessionNotesPayload {
    #[validate(length(max = 10000))]
    pub session_notes: String,
    #[validate(url)]
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingChatResponse {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}
