use axum::response::{IntoResponse, Json};

use crate::{
    dto::booking_dto::{WizardAdvancePayload, WizardAdvanceResponse, WizardDirection},
    error::{Error, Result},
    services::booking_wizard::{self, WizardError},
};

fn wizard_error(err: WizardError) -> Error {
    match err {
        WizardError::UnknownStep { .. } => {
            Error::BadRequest("Este passo não existe neste fluxo de agendamento.".into())
        }
        WizardError::Incomplete { missing, .. } => Error::BadRequest(format!(
            "Preencha os campos obrigatórios: {}.",
            missing.join(", ")
        )),
    }
}

#[utoipa::path(
    post,
    path = "/api/booking-wizard/advance",
    request_body = WizardAdvancePayload,
    responses(
        (status = 200, description = "New wizard position", body = WizardAdvanceResponse),
        (status = 400, description = "Current step incomplete or not part of the flow")
    )
)]
#[axum::debug_handler]
pub async fn advance(Json(payload): Json<WizardAdvancePayload>) -> Result<impl IntoResponse> {
    let position = match payload.direction {
        WizardDirection::Forward => {
            booking_wizard::advance(payload.flow, payload.step, &payload.draft)
        }
        WizardDirection::Back => booking_wizard::back(payload.flow, payload.step),
    }
    .map_err(wizard_error)?;

    let ready_to_submit = position.is_last && payload.draft.is_complete(payload.flow);
    Ok(Json(WizardAdvanceResponse {
        position,
        ready_to_submit,
    }))
}
