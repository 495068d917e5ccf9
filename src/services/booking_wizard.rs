use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::{MeetingPlatform, PayerSource};
use crate::models::pillar::Pillar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    SelectCompanyUser,
    SelectPillarProvider,
    SelectDateTime,
    Details,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardFlow {
    /// The caller books for themselves.
    SelfBooking,
    /// A specialist books on behalf of a user of a company.
    Referral,
}

impl WizardFlow {
    pub fn steps(self) -> &'static [WizardStep] {
        match self {
            WizardFlow::SelfBooking => &[
                WizardStep::SelectPillarProvider,
                WizardStep::SelectDateTime,
                WizardStep::Details,
            ],
            WizardFlow::Referral => &[
                WizardStep::SelectCompanyUser,
                WizardStep::SelectPillarProvider,
                WizardStep::SelectDateTime,
                WizardStep::Details,
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingDraft {
    pub company_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub pillar: Option<Pillar>,
    pub prestador_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub topic: Option<String>,
    pub notes: Option<String>,
    pub meeting_platform: Option<MeetingPlatform>,
    pub payer_source: Option<PayerSource>,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

impl BookingDraft {
    /// Names of the required fields still unset for `step`.
    pub fn missing_for(&self, step: WizardStep) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match step {
            WizardStep::SelectCompanyUser => {
                if self.company_id.is_none() {
                    missing.push("company_id");
                }
                if self.user_id.is_none() {
                    missing.push("user_id");
                }
            }
            WizardStep::SelectPillarProvider => {
                if self.pillar.is_none() {
                    missing.push("pillar");
                }
                if self.prestador_id.is_none() {
                    missing.push("prestador_id");
                }
            }
            WizardStep::SelectDateTime => {
                if self.date.is_none() {
                    missing.push("date");
                }
                if self.time.is_none() {
                    missing.push("time");
                }
            }
            WizardStep::Details => {
                if blank(&self.topic) {
                    missing.push("topic");
                }
                if self.meeting_platform.is_none() {
                    missing.push("meeting_platform");
                }
            }
        }
        missing
    }

    pub fn step_complete(&self, step: WizardStep) -> bool {
        self.missing_for(step).is_empty()
    }

    pub fn is_complete(&self, flow: WizardFlow) -> bool {
        flow.steps().iter().all(|s| self.step_complete(*s))
    }

    /// Missing fields across every step of `flow`.
    pub fn missing(&self, flow: WizardFlow) -> Vec<&'static str> {
        flow.steps()
            .iter()
            .flat_map(|s| self.missing_for(*s))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("step {step:?} is not part of this flow")]
    UnknownStep { step: WizardStep },
    #[error("step {step:?} is incomplete: {missing:?}")]
    Incomplete {
        step: WizardStep,
        missing: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WizardPosition {
    pub step: WizardStep,
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub is_last: bool,
}

fn position(flow: WizardFlow, index: usize) -> WizardPosition {
    let steps = flow.steps();
    WizardPosition {
        step: steps[index],
        index: index + 1,
        total: steps.len(),
        is_last: index + 1 == steps.len(),
    }
}

fn index_of(flow: WizardFlow, step: WizardStep) -> Result<usize, WizardError> {
    flow.steps()
        .iter()
        .position(|s| *s == step)
        .ok_or(WizardError::UnknownStep { step })
}

pub fn start(flow: WizardFlow) -> WizardPosition {
    position(flow, 0)
}

/// Moves forward only when `current` and every step before it are complete.
/// On the last step a complete draft stays where it is, ready for submission.
pub fn advance(
    flow: WizardFlow,
    current: WizardStep,
    draft: &BookingDraft,
) -> Result<WizardPosition, WizardError> {
    let index = index_of(flow, current)?;
    for step in &flow.steps()[..=index] {
        let missing = draft.missing_for(*step);
        if !missing.is_empty() {
            return Err(WizardError::Incomplete {
                step: *step,
                missing,
            });
        }
    }
    let next = (index + 1).min(flow.steps().len() - 1);
    Ok(position(flow, next))
}

pub fn back(flow: WizardFlow, current: WizardStep) -> Result<WizardPosition, WizardError> {
    let index = index_of(flow, current)?;
    Ok(position(flow, index.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_through_provider() -> BookingDraft {
        BookingDraft {
            pillar: Some(Pillar::MentalHealth),
            prestador_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
    }

    #[test]
    fn date_step_needs_both_date_and_time() {
        let mut draft = draft_through_provider();
        draft.date = NaiveDate::from_ymd_opt(2026, 11, 2);

        let err = advance(WizardFlow::SelfBooking, WizardStep::SelectDateTime, &draft).unwrap_err();
        assert_eq!(
            err,
            WizardError::Incomplete {
                step: WizardStep::SelectDateTime,
                missing: vec!["time"],
            }
        );

        draft.date = None;
        draft.time = NaiveTime::from_hms_opt(10, 0, 0);
        assert!(advance(WizardFlow::SelfBooking, WizardStep::SelectDateTime, &draft).is_err());

        draft.date = NaiveDate::from_ymd_opt(2026, 11, 2);
        let next = advance(WizardFlow::SelfBooking, WizardStep::SelectDateTime, &draft).unwrap();
        assert_eq!(next.step, WizardStep::Details);
        assert_eq!((next.index, next.total), (3, 3));
        assert!(next.is_last);
    }

    #[test]
    fn earlier_unset_steps_block_advancing() {
        let draft = BookingDraft {
            date: NaiveDate::from_ymd_opt(2026, 11, 2),
            time: NaiveTime::from_hms_opt(10, 0, 0),
            ..Default::default()
        };
        assert_eq!(
            advance(WizardFlow::SelfBooking, WizardStep::SelectDateTime, &draft),
            Err(WizardError::Incomplete {
                step: WizardStep::SelectPillarProvider,
                missing: vec!["pillar", "prestador_id"],
            })
        );

        let mut referral = draft_through_provider();
        referral.date = draft.date;
        referral.time = draft.time;
        let err = advance(WizardFlow::Referral, WizardStep::SelectDateTime, &referral).unwrap_err();
        assert!(matches!(err, WizardError::Incomplete { step: WizardStep::SelectCompanyUser, .. }));
    }

    #[test]
    fn referral_starts_with_company_and_user() {
        assert_eq!(start(WizardFlow::Referral).step, WizardStep::SelectCompanyUser);
        let draft = BookingDraft {
            company_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let err = advance(WizardFlow::Referral, WizardStep::SelectCompanyUser, &draft).unwrap_err();
        assert!(matches!(err, WizardError::Incomplete { ref missing, .. } if missing == &vec!["user_id"]));
    }

    #[test]
    fn self_booking_has_no_company_step() {
        assert_eq!(
            advance(
                WizardFlow::SelfBooking,
                WizardStep::SelectCompanyUser,
                &BookingDraft::default()
            ),
            Err(WizardError::UnknownStep {
                step: WizardStep::SelectCompanyUser
            })
        );
    }

    #[test]
    fn back_stops_at_first_step() {
        let pos = back(WizardFlow::SelfBooking, WizardStep::SelectPillarProvider).unwrap();
        assert_eq!(pos.step, WizardStep::SelectPillarProvider);
        let pos = back(WizardFlow::Referral, WizardStep::SelectDateTime).unwrap();
        assert_eq!(pos.step, WizardStep::SelectPillarProvider);
    }

    #[test]
    fn details_require_topic_text() {
        let mut draft = draft_through_provider();
        draft.date = NaiveDate::from_ymd_opt(2026, 11, 2);
        draft.time = NaiveTime::from_hms_opt(10, 0, 0);
        draft.topic = Some("   ".into());
        draft.meeting_platform = Some(MeetingPlatform::Zoom);
        assert!(!draft.is_complete(WizardFlow::SelfBooking));
        assert_eq!(draft.missing(WizardFlow::SelfBooking), vec!["topic"]);

        draft.topic = Some("Ansiedade no trabalho".into());
        assert!(draft.is_complete(WizardFlow::SelfBooking));
        assert!(!draft.is_complete(WizardFlow::Referral));
    }
}
