use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::dto::auth_dto::{CompanyQuota, QuotaResponse};
use crate::dto::booking_dto::{
    BookingChatResponse, BookingListQuery, CreateBookingPayload, RatingPayload, ReferralPayload,
    ReschedulePayload, RescheduleResponse, SessionNotesPayload,
};
use crate::error::{is_unique_violation, Error, Result};
use crate::models::booking::{Booking, BookingStatus, PayerSource, TransitionError};
use crate::models::company::Company;
use crate::models::employee::CompanyEmployee;
use crate::models::pillar::Pillar;
use crate::models::prestador::Prestador;
use crate::models::profile::{Profile, Role};
use crate::services::availability_service::AvailabilityService;
use crate::services::booking_wizard::{BookingDraft, WizardFlow};
use crate::services::chat_service::ChatService;
use crate::services::notification_service::{self, NotificationService};
use crate::services::prestador_service::PrestadorService;
use crate::services::profile_service::ProfileService;
use crate::utils::time::{format_slot, today};

const BOOKING_COLUMNS: &str = "id, user_id, prestador_id, company_id, booked_by, pillar, booking_date, \
     start_time, status, payer_source, meeting_platform, meeting_link, topic, notes, session_notes, \
     rating, feedback, was_deducted, deducted_at, cancellation_reason, cancelled_at, rescheduled_from, \
     chat_session_id, created_at, updated_at";

const SLOT_TAKEN: &str = "Este horário já não está disponível.";

/// Which rows of `bookings` a caller may list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingScope {
    pub user_id: Option<Uuid>,
    /// Provider bookings plus referrals the caller made.
    pub staff_user_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
}

impl BookingScope {
    pub fn for_profile(profile: &Profile) -> Result<Self> {
        let scope = match profile.role {
            Role::Admin => BookingScope::default(),
            Role::User => BookingScope {
                user_id: Some(profile.id),
                ..Default::default()
            },
            Role::Prestador | Role::Specialist => BookingScope {
                staff_user_id: Some(profile.id),
                ..Default::default()
            },
            Role::Hr => BookingScope {
                company_id: Some(profile.company_id.ok_or_else(|| {
                    Error::Forbidden("A sua conta não está associada a uma empresa.".into())
                })?),
                ..Default::default()
            },
        };
        Ok(scope)
    }
}

/// How the caller relates to one booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relation {
    pub owner: bool,
    pub provider: bool,
    pub booker: bool,
    pub company_hr: bool,
    pub admin: bool,
}

impl Relation {
    pub fn of(caller: &Profile, booking: &Booking, provider_user_id: Option<Uuid>) -> Self {
        Self {
            owner: booking.user_id == caller.id,
            provider: provider_user_id == Some(caller.id),
            booker: booking.booked_by == Some(caller.id) && booking.user_id != caller.id,
            company_hr: caller.role == Role::Hr
                && caller.company_id.is_some()
                && caller.company_id == booking.company_id,
            admin: caller.role == Role::Admin,
        }
    }

    pub fn can_view(&self) -> bool {
        self.owner || self.provider || self.booker || self.company_hr || self.admin
    }

    pub fn can_set_status(&self, next: BookingStatus) -> bool {
        match next {
            BookingStatus::Cancelled => self.owner || self.provider || self.booker || self.admin,
            BookingStatus::Confirmed | BookingStatus::Completed | BookingStatus::NoShow => {
                self.provider || self.admin
            }
            BookingStatus::Scheduled | BookingStatus::Rescheduled => false,
        }
    }

    pub fn can_reschedule(&self) -> bool {
        self.owner || self.provider || self.booker || self.admin
    }

    pub fn can_read_clinical(&self) -> bool {
        self.provider || self.booker || self.admin
    }
}

pub fn transition_error(err: TransitionError) -> Error {
    let message = match err {
        TransitionError::Terminal(status) => format!(
            "Esta sessão já está {} e não pode ser alterada.",
            status_label(status)
        ),
        TransitionError::NotAllowed { from, to } => format!(
            "Não é possível passar de {} para {}.",
            status_label(from),
            status_label(to)
        ),
        TransitionError::AlreadyDeducted => "Esta sessão já foi descontada.".to_string(),
    };
    Error::Conflict(message)
}

pub fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Scheduled => "agendada",
        BookingStatus::Confirmed => "confirmada",
        BookingStatus::Completed => "concluída",
        BookingStatus::Cancelled => "cancelada",
        BookingStatus::NoShow => "marcada como falta",
        BookingStatus::Rescheduled => "reagendada",
    }
}

pub fn ensure_draft_complete(draft: &BookingDraft, flow: WizardFlow) -> Result<()> {
    let missing = draft.missing(flow);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "Campos em falta: {}.",
            missing.join(", ")
        )))
    }
}

pub fn ensure_bookable(prestador: &Prestador, pillar: Pillar, date: NaiveDate, today: NaiveDate) -> Result<()> {
    if !prestador.is_bookable() {
        return Err(Error::BadRequest("Este prestador não está disponível.".into()));
    }
    if !prestador.serves(pillar) {
        return Err(Error::BadRequest(format!(
            "Este prestador não atende {}.",
            pillar.label()
        )));
    }
    if date < today {
        return Err(Error::BadRequest(
            "Não é possível marcar sessões no passado.".into(),
        ));
    }
    Ok(())
}

/// Scheduled or confirmed bookings that will draw on each counter once completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSessions {
    pub company: i32,
    pub employee: i32,
    pub personal: i32,
}

/// Quota is checked at booking time and consumed only on completion, so
/// sessions already booked but not yet completed count as taken.
pub fn ensure_fundable(
    payer: PayerSource,
    day: NaiveDate,
    patient: &Profile,
    company: Option<&Company>,
    employee: Option<&CompanyEmployee>,
    pending: PendingSessions,
) -> Result<()> {
    match payer {
        PayerSource::Company => {
            let company = company.ok_or_else(|| {
                Error::BadRequest("Não está associado a nenhuma empresa.".into())
            })?;
            if !company.can_fund_session(day, pending.company) {
                return Err(Error::BadRequest(
                    "A empresa não tem sessões disponíveis para esta data.".into(),
                ));
            }
            if employee.is_some_and(|e| !e.has_quota_left(pending.employee)) {
                return Err(Error::BadRequest(
                    "Atingiu o limite de sessões atribuído pela sua empresa.".into(),
                ));
            }
            Ok(())
        }
        PayerSource::Personal => {
            if patient.personal_sessions_remaining() > pending.personal {
                Ok(())
            } else {
                Err(Error::BadRequest(
                    "Não tem sessões pessoais disponíveis.".into(),
                ))
            }
        }
    }
}

/// Session notes stay with the provider, the referring specialist and admins.
fn present(booking: Booking, relation: &Relation) -> Booking {
    if relation.can_read_clinical() {
        booking
    } else {
        booking.without_clinical_notes()
    }
}

fn slot_conflict(err: sqlx::Error) -> Error {
    if is_unique_violation(&err) {
        Error::Conflict(SLOT_TAKEN.into())
    } else {
        err.into()
    }
}

#[derive(Clone)]
pub struct BookingService {
    pool: PgPool,
    availability: AvailabilityService,
    prestadores: PrestadorService,
    profiles: ProfileService,
    chat: ChatService,
    notifications: NotificationService,
}

impl BookingService {
    pub fn new(
        pool: PgPool,
        availability: AvailabilityService,
        prestadores: PrestadorService,
        profiles: ProfileService,
        chat: ChatService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            pool,
            availability,
            prestadores,
            profiles,
            chat,
            notifications,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Sessão não encontrada.".into()))
    }

    async fn lock(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Booking> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1 FOR UPDATE", BOOKING_COLUMNS);
        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::NotFound("Sessão não encontrada.".into()))
    }

    async fn provider_user_id(&self, prestador_id: Uuid) -> Result<Option<Uuid>> {
        let user_id = sqlx::query_scalar::<_, Option<Uuid>>("SELECT user_id FROM prestadores WHERE id = $1")
            .bind(prestador_id)
            .fetch_optional(&self.pool)
            .await?
            .flatten();
        Ok(user_id)
    }

    async fn relation(&self, caller: &Profile, booking: &Booking) -> Result<Relation> {
        let provider_user_id = self.provider_user_id(booking.prestador_id).await?;
        Ok(Relation::of(caller, booking, provider_user_id))
    }

    /// Booking visible to `caller`, 404 otherwise.
    pub async fn get_for(&self, caller: &Profile, id: Uuid) -> Result<Booking> {
        let booking = self.get(id).await?;
        let relation = self.relation(caller, &booking).await?;
        if relation.can_view() {
            Ok(present(booking, &relation))
        } else {
            Err(Error::NotFound("Sessão não encontrada.".into()))
        }
    }

    pub async fn list(&self, caller: &Profile, filter: BookingListQuery) -> Result<Vec<Booking>> {
        let scope = BookingScope::for_profile(caller)?;
        let query = format!(
            r#"
            SELECT {} FROM bookings
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::uuid IS NULL
                   OR booked_by = $2
                   OR prestador_id IN (SELECT id FROM prestadores WHERE user_id = $2))
              AND ($3::uuid IS NULL OR company_id = $3)
              AND ($4::booking_status IS NULL OR status = $4)
              AND ($5::date IS NULL OR booking_date >= $5)
              AND ($6::date IS NULL OR booking_date <= $6)
            ORDER BY booking_date DESC, start_time DESC
            "#,
            BOOKING_COLUMNS
        );
        let items = sqlx::query_as::<_, Booking>(&query)
            .bind(scope.user_id)
            .bind(scope.staff_user_id)
            .bind(scope.company_id)
            .bind(filter.status)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.pool)
            .await?;

        let managed = self.managed_prestadores(caller.id).await?;
        let items = items
            .into_iter()
            .map(|booking| {
                let provider = managed.contains(&booking.prestador_id).then_some(caller.id);
                let relation = Relation::of(caller, &booking, provider);
                present(booking, &relation)
            })
            .collect();
        Ok(items)
    }

    async fn managed_prestadores(&self, user_id: Uuid) -> Result<HashSet<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM prestadores WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// `exclude` leaves out a booking that is being moved rather than added.
    async fn pending_sessions(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        exclude: Option<Uuid>,
    ) -> Result<PendingSessions> {
        let (company, employee, personal) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE payer_source = 'company' AND company_id = $2),
                COUNT(*) FILTER (WHERE payer_source = 'company' AND company_id = $2 AND user_id = $1),
                COUNT(*) FILTER (WHERE payer_source = 'personal' AND user_id = $1)
            FROM bookings
            WHERE status IN ('scheduled', 'confirmed')
              AND (user_id = $1 OR company_id = $2)
              AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        let clamp = |n: i64| i32::try_from(n).unwrap_or(i32::MAX);
        Ok(PendingSessions {
            company: clamp(company),
            employee: clamp(employee),
            personal: clamp(personal),
        })
    }

    async fn check_funding(
        &self,
        patient: &Profile,
        payer: PayerSource,
        day: NaiveDate,
        company_id: Option<Uuid>,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        let (company, employee) = match company_id {
            Some(company_id) => (
                self.company(company_id).await?,
                self.employee(company_id, patient.id).await?,
            ),
            None => (None, None),
        };
        let pending = self.pending_sessions(patient.id, company_id, exclude).await?;
        ensure_fundable(payer, day, patient, company.as_ref(), employee.as_ref(), pending)
    }

    async fn company(&self, company_id: Uuid) -> Result<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            SELECT id, name, nif, email, phone, sessions_allocated, sessions_used,
                   contract_start_date, contract_end_date, is_active, created_at, updated_at
            FROM companies WHERE id = $1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(company)
    }

    async fn employee(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<CompanyEmployee>> {
        let employee = sqlx::query_as::<_, CompanyEmployee>(
            r#"
            SELECT id, company_id, user_id, name, email, access_code, sessions_allocated,
                   sessions_used, registered_at, created_at
            FROM company_employees WHERE company_id = $1 AND user_id = $2
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    pub async fn create(&self, caller: &Profile, payload: CreateBookingPayload) -> Result<Booking> {
        ensure_draft_complete(&payload.draft(), WizardFlow::SelfBooking)?;
        self.create_for(caller, caller.id, payload).await
    }

    /// A specialist books on behalf of a company user.
    pub async fn create_referral(&self, caller: &Profile, payload: ReferralPayload) -> Result<Booking> {
        ensure_draft_complete(&payload.draft(), WizardFlow::Referral)?;
        let patient = self
            .profiles
            .get_by_id(payload.user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Utilizador não encontrado.".into()))?;
        if patient.company_id != Some(payload.company_id) {
            return Err(Error::BadRequest(
                "O utilizador não pertence a esta empresa.".into(),
            ));
        }
        self.create_for(&patient, caller.id, payload.booking).await
    }

    async fn create_for(&self, patient: &Profile, booked_by: Uuid, payload: CreateBookingPayload) -> Result<Booking> {
        let prestador = self.prestadores.get(payload.prestador_id).await?;
        ensure_bookable(&prestador, payload.pillar, payload.date, today())?;

        if !self
            .availability
            .is_available(&prestador, payload.date, payload.time)
            .await?
        {
            return Err(Error::Conflict(SLOT_TAKEN.into()));
        }

        self.check_funding(patient, payload.payer_source, payload.date, patient.company_id, None)
            .await?;

        if let Some(chat_id) = payload.chat_session_id {
            if !self.chat.belongs_to(chat_id, patient.id).await? {
                return Err(Error::BadRequest("Conversa inválida para esta sessão.".into()));
            }
        }

        let query = format!(
            r#"
            INSERT INTO bookings (
                user_id, prestador_id, company_id, booked_by, pillar, booking_date, start_time,
                payer_source, meeting_platform, topic, notes, chat_session_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let booking = sqlx::query_as::<_, Booking>(&query)
            .bind(patient.id)
            .bind(prestador.id)
            .bind(patient.company_id)
            .bind(booked_by)
            .bind(payload.pillar)
            .bind(payload.date)
            .bind(payload.time)
            .bind(payload.payer_source)
            .bind(payload.meeting_platform)
            .bind(payload.topic.trim())
            .bind(payload.notes)
            .bind(payload.chat_session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(slot_conflict)?;

        tracing::info!(
            booking_id = %booking.id,
            prestador_id = %prestador.id,
            referral = booking.is_referral(),
            "Booking created"
        );
        self.announce(&booking, prestador.user_id, "booking_created", "Nova sessão agendada")
            .await;
        Ok(booking)
    }

    async fn announce(&self, booking: &Booking, provider_user_id: Option<Uuid>, kind: &str, title: &str) {
        let message = format!(
            "{} às {} ({})",
            booking.booking_date.format("%d/%m/%Y"),
            format_slot(booking.start_time),
            booking.pillar.label()
        );
        let payload = Some(json!({ "booking_id": booking.id, "status": booking.status }));
        self.notifications
            .notify_quietly(booking.user_id, kind, title, &message, payload.clone())
            .await;
        if let Some(provider) = provider_user_id {
            self.notifications
                .notify_quietly(provider, kind, title, &message, payload)
                .await;
        }
    }

    /// The only place a booking's status changes. Entering `completed`
    /// consumes one unit of the payer's quota in the same transaction.
    pub async fn transition(
        &self,
        caller: &Profile,
        id: Uuid,
        next: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking> {
        if next == BookingStatus::Rescheduled {
            return Err(Error::BadRequest(
                "Use o reagendamento para mudar a data da sessão.".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let booking = self.lock(&mut tx, id).await?;
        let provider_user_id = self.provider_user_id(booking.prestador_id).await?;
        let relation = Relation::of(caller, &booking, provider_user_id);
        if !relation.can_view() {
            return Err(Error::NotFound("Sessão não encontrada.".into()));
        }
        if !relation.can_set_status(next) {
            return Err(Error::Forbidden("Sem permissão para esta operação.".into()));
        }

        let plan = booking
            .status
            .plan_transition(next, booking.was_deducted)
            .map_err(transition_error)?;
        if plan.deduct {
            deduct(&mut tx, &booking).await?;
        }

        let query = format!(
            r#"
            UPDATE bookings
            SET
                status = $2,
                was_deducted = was_deducted OR $3,
                deducted_at = CASE WHEN $3 THEN NOW() ELSE deducted_at END,
                cancellation_reason = CASE WHEN $2 = 'cancelled'::booking_status THEN $4 ELSE cancellation_reason END,
                cancelled_at = CASE WHEN $2 = 'cancelled'::booking_status THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let updated = sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .bind(plan.next)
            .bind(plan.deduct)
            .bind(reason)
            .fetch_one(&mut *tx)
            .await?;
        debug_assert!(updated.deduction_consistent(), "deduction flags out of sync");
        tx.commit().await?;

        tracing::info!(
            booking_id = %id,
            from = ?booking.status,
            to = ?plan.next,
            deducted = plan.deduct,
            "Booking status changed"
        );
        if plan.next == BookingStatus::Cancelled {
            self.announce(&updated, provider_user_id, "booking_cancelled", "Sessão cancelada")
                .await;
        }
        Ok(present(updated, &relation))
    }

    /// Retires the booking as `rescheduled` and books the new slot in its place.
    pub async fn reschedule(&self, caller: &Profile, id: Uuid, payload: ReschedulePayload) -> Result<RescheduleResponse> {
        let current = self.get(id).await?;
        let relation = self.relation(caller, &current).await?;
        if !relation.can_view() {
            return Err(Error::NotFound("Sessão não encontrada.".into()));
        }
        if !relation.can_reschedule() {
            return Err(Error::Forbidden("Sem permissão para esta operação.".into()));
        }

        let prestador = self.prestadores.get(current.prestador_id).await?;
        ensure_bookable(&prestador, current.pillar, payload.date, today())?;
        if !self
            .availability
            .is_available(&prestador, payload.date, payload.time)
            .await?
        {
            return Err(Error::Conflict(SLOT_TAKEN.into()));
        }

        let patient = self
            .profiles
            .get_by_id(current.user_id)
            .await?
            .ok_or_else(|| Error::NotFound("Utilizador não encontrado.".into()))?;
        self.check_funding(
            &patient,
            current.payer_source,
            payload.date,
            current.company_id,
            Some(current.id),
        )
        .await?;

        let mut tx = self.pool.begin().await?;
        let booking = self.lock(&mut tx, id).await?;
        let plan = booking
            .status
            .plan_transition(BookingStatus::Rescheduled, booking.was_deducted)
            .map_err(transition_error)?;

        let retire = format!(
            "UPDATE bookings SET status = $2, cancellation_reason = $3, updated_at = NOW()
             WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        );
        let previous = sqlx::query_as::<_, Booking>(&retire)
            .bind(id)
            .bind(plan.next)
            .bind(&payload.reason)
            .fetch_one(&mut *tx)
            .await?;

        let insert = format!(
            r#"
            INSERT INTO bookings (
                user_id, prestador_id, company_id, booked_by, pillar, booking_date, start_time,
                payer_source, meeting_platform, meeting_link, topic, notes, chat_session_id,
                rescheduled_from
            )
            SELECT user_id, prestador_id, company_id, $2, pillar, $3, $4,
                   payer_source, meeting_platform, meeting_link, topic, notes, chat_session_id, id
            FROM bookings WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let replacement = sqlx::query_as::<_, Booking>(&insert)
            .bind(id)
            .bind(caller.id)
            .bind(payload.date)
            .bind(payload.time)
            .fetch_one(&mut *tx)
            .await
            .map_err(slot_conflict)?;

        notification_service::insert(
            &mut *tx,
            replacement.user_id,
            "booking_rescheduled",
            "Sessão reagendada",
            &format!(
                "A sua sessão passou para {} às {}.",
                replacement.booking_date.format("%d/%m/%Y"),
                format_slot(replacement.start_time)
            ),
            Some(json!({ "booking_id": replacement.id, "previous_id": previous.id })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(previous_id = %id, booking_id = %replacement.id, "Booking rescheduled");
        Ok(RescheduleResponse {
            previous: present(previous, &relation),
            booking: present(replacement, &relation),
        })
    }

    pub async fn rate(&self, caller: &Profile, id: Uuid, payload: RatingPayload) -> Result<Booking> {
        let booking = self.get(id).await?;
        if booking.user_id != caller.id {
            return Err(Error::NotFound("Sessão não encontrada.".into()));
        }
        if booking.status != BookingStatus::Completed {
            return Err(Error::BadRequest(
                "Só pode avaliar sessões concluídas.".into(),
            ));
        }

        let query = format!(
            "UPDATE bookings SET rating = $2, feedback = $3, updated_at = NOW() WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        );
        let updated = sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .bind(payload.rating)
            .bind(payload.feedback)
            .fetch_one(&self.pool)
            .await?;
        let relation = self.relation(caller, &updated).await?;
        Ok(present(updated, &relation))
    }

    pub async fn save_notes(&self, caller: &Profile, id: Uuid, payload: SessionNotesPayload) -> Result<Booking> {
        let booking = self.get(id).await?;
        let relation = self.relation(caller, &booking).await?;
        if !(relation.provider || relation.admin) {
            return Err(Error::Forbidden(
                "Só o prestador da sessão pode registar notas.".into(),
            ));
        }

        let query = format!(
            r#"
            UPDATE bookings
            SET session_notes = $2, meeting_link = COALESCE($3, meeting_link), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let updated = sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .bind(payload.session_notes)
            .bind(payload.meeting_link)
            .fetch_one(&self.pool)
            .await?;
        Ok(updated)
    }

    pub async fn chat(&self, caller: &Profile, id: Uuid) -> Result<BookingChatResponse> {
        let booking = self.get(id).await?;
        let relation = self.relation(caller, &booking).await?;
        if !relation.can_read_clinical() {
            return Err(Error::Forbidden("Sem permissão para esta operação.".into()));
        }
        let session_id = booking
            .chat_session_id
            .ok_or_else(|| Error::NotFound("Esta sessão não tem conversa associada.".into()))?;
        let (session, messages) = self.chat.transcript(session_id).await?;
        Ok(BookingChatResponse { session, messages })
    }

    pub async fn quota(&self, profile: &Profile) -> Result<QuotaResponse> {
        let payer_company = match profile.company_id {
            Some(company_id) => match self.company(company_id).await? {
                Some(company) => {
                    let employee = self.employee(company_id, profile.id).await?;
                    Some(CompanyQuota {
                        company_id,
                        company_remaining: company.sessions_remaining(),
                        company_name: company.name,
                        employee_allocated: employee.as_ref().map_or(0, |e| e.sessions_allocated),
                        employee_used: employee.as_ref().map_or(0, |e| e.sessions_used),
                    })
                }
                None => None,
            },
            None => None,
        };
        Ok(QuotaResponse {
            payer_company,
            personal_allocated: profile.personal_sessions_allocated,
            personal_used: profile.personal_sessions_used,
            personal_remaining: profile.personal_sessions_remaining(),
        })
    }
}

/// Consumes one session from whoever pays for `booking`. A counter that is
/// already at its allocation refuses the completion.
async fn deduct(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> Result<()> {
    match booking.payer_source {
        PayerSource::Company => {
            let Some(company_id) = booking.company_id else {
                tracing::warn!(booking_id = %booking.id, "Company-paid booking has no company, nothing to deduct");
                return Ok(());
            };
            let charged = sqlx::query(
                "UPDATE companies SET sessions_used = sessions_used + 1, updated_at = NOW()
                 WHERE id = $1 AND sessions_used < sessions_allocated",
            )
            .bind(company_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
            if charged == 0 {
                return Err(Error::Conflict(
                    "A empresa já não tem sessões disponíveis para concluir esta sessão.".into(),
                ));
            }

            let charged = sqlx::query(
                "UPDATE company_employees SET sessions_used = sessions_used + 1
                 WHERE company_id = $1 AND user_id = $2
                   AND (sessions_allocated = 0 OR sessions_used < sessions_allocated)",
            )
            .bind(company_id)
            .bind(booking.user_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
            if charged == 0 {
                let on_roster = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM company_employees WHERE company_id = $1 AND user_id = $2)",
                )
                .bind(company_id)
                .bind(booking.user_id)
                .fetch_one(&mut **tx)
                .await?;
                if on_roster {
                    return Err(Error::Conflict(
                        "O colaborador já atingiu o limite de sessões atribuído.".into(),
                    ));
                }
            }
        }
        PayerSource::Personal => {
            let charged = sqlx::query(
                "UPDATE profiles SET personal_sessions_used = personal_sessions_used + 1, updated_at = NOW()
                 WHERE id = $1 AND personal_sessions_used < personal_sessions_allocated",
            )
            .bind(booking.user_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
            if charged == 0 {
                return Err(Error::Conflict(
                    "Já não tem sessões pessoais disponíveis para concluir esta sessão.".into(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, d).unwrap()
    }

    fn company(allocated: i32, used: i32) -> Company {
        Company {
            id: Uuid::new_v4(),
            name: "Acme Lda".into(),
            nif: "501234567".into(),
            email: None,
            phone: None,
            sessions_allocated: allocated,
            sessions_used: used,
            contract_start_date: Some(day(1)),
            contract_end_date: Some(day(30)),
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn prestador() -> Prestador {
        Prestador {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            name: "Dr. Rui".into(),
            email: "rui@clinica.pt".into(),
            bio: None,
            specialties: vec![],
            pillars: vec![Pillar::LegalAssistance],
            available_weekdays: vec![1, 2, 3, 4, 5],
            is_approved: true,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn booking_for(user_id: Uuid) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id,
            prestador_id: Uuid::new_v4(),
            company_id: None,
            booked_by: Some(user_id),
            pillar: Pillar::LegalAssistance,
            booking_date: day(10),
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            status: BookingStatus::Scheduled,
            payer_source: PayerSource::Personal,
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

    const NONE_PENDING: PendingSessions = PendingSessions {
        company: 0,
        employee: 0,
        personal: 0,
    };

    fn roster_entry(company_id: Uuid, user_id: Uuid, allocated: i32, used: i32) -> CompanyEmployee {
        CompanyEmployee {
            id: Uuid::new_v4(),
            company_id,
            user_id: Some(user_id),
            name: "Ana".into(),
            email: "ana@acme.pt".into(),
            access_code: "ABCD2345".into(),
            sessions_allocated: allocated,
            sessions_used: used,
            registered_at: None,
            created_at: None,
        }
    }

    #[test]
    fn company_payer_needs_remaining_quota_and_contract() {
        let patient = Profile::minimal(Uuid::new_v4(), "ana@acme.pt");
        let pay = |day: NaiveDate, company: Option<&Company>| {
            ensure_fundable(PayerSource::Company, day, &patient, company, None, NONE_PENDING)
        };
        let open = company(10, 3);
        assert!(pay(day(5), Some(&open)).is_ok());
        assert!(pay(day(5), Some(&company(10, 10))).is_err());

        let outside_contract = NaiveDate::from_ymd_opt(2026, 12, 15).unwrap();
        assert!(pay(outside_contract, Some(&open)).is_err());
        assert!(pay(day(5), None).is_err());
    }

    #[test]
    fn employee_allocation_caps_company_payer() {
        let patient = Profile::minimal(Uuid::new_v4(), "ana@acme.pt");
        let open = company(10, 3);
        let employee = roster_entry(open.id, patient.id, 2, 2);
        let result = ensure_fundable(
            PayerSource::Company,
            day(5),
            &patient,
            Some(&open),
            Some(&employee),
            NONE_PENDING,
        );
        assert!(result.is_err());
    }

    #[test]
    fn booked_sessions_count_against_quota() {
        let mut patient = Profile::minimal(Uuid::new_v4(), "ana@acme.pt");
        patient.personal_sessions_allocated = 1;
        let one_booked = PendingSessions {
            personal: 1,
            ..NONE_PENDING
        };
        assert!(ensure_fundable(PayerSource::Personal, day(5), &patient, None, None, one_booked).is_err());

        let open = company(10, 8);
        let two_booked = PendingSessions {
            company: 2,
            ..NONE_PENDING
        };
        assert!(
            ensure_fundable(PayerSource::Company, day(5), &patient, Some(&open), None, two_booked).is_err()
        );

        let employee = roster_entry(open.id, patient.id, 3, 1);
        let company_pending = PendingSessions {
            company: 1,
            employee: 1,
            personal: 0,
        };
        assert!(ensure_fundable(
            PayerSource::Company,
            day(5),
            &patient,
            Some(&open),
            Some(&employee),
            company_pending,
        )
        .is_ok());
        let employee_full = PendingSessions {
            employee: 2,
            ..company_pending
        };
        assert!(ensure_fundable(
            PayerSource::Company,
            day(5),
            &patient,
            Some(&open),
            Some(&employee),
            employee_full,
        )
        .is_err());
    }

    #[test]
    fn personal_payer_uses_personal_counter() {
        let mut patient = Profile::minimal(Uuid::new_v4(), "ana@acme.pt");
        assert!(ensure_fundable(PayerSource::Personal, day(5), &patient, None, None, NONE_PENDING).is_err());
        patient.personal_sessions_allocated = 1;
        assert!(ensure_fundable(PayerSource::Personal, day(5), &patient, None, None, NONE_PENDING).is_ok());
    }

    #[test]
    fn clinical_notes_hidden_from_owner_and_hr() {
        let owner = Profile::minimal(Uuid::new_v4(), "ana@acme.pt");
        let provider = Profile::minimal(Uuid::new_v4(), "rui@clinica.pt");
        let mut booking = booking_for(owner.id);
        booking.session_notes = Some("Ansiedade generalizada".into());

        let as_owner = Relation::of(&owner, &booking, Some(provider.id));
        assert_eq!(present(booking.clone(), &as_owner).session_notes, None);

        let mut hr = Profile::minimal(Uuid::new_v4(), "rh@acme.pt");
        hr.role = Role::Hr;
        hr.company_id = Some(Uuid::new_v4());
        booking.company_id = hr.company_id;
        let as_hr = Relation::of(&hr, &booking, Some(provider.id));
        assert!(as_hr.can_view());
        assert_eq!(present(booking.clone(), &as_hr).session_notes, None);

        let as_provider = Relation::of(&provider, &booking, Some(provider.id));
        assert_eq!(
            present(booking, &as_provider).session_notes.as_deref(),
            Some("Ansiedade generalizada")
        );
    }

    #[test]
    fn provider_must_serve_pillar_and_date_not_past() {
        let p = prestador();
        assert!(ensure_bookable(&p, Pillar::LegalAssistance, day(10), day(9)).is_ok());
        assert!(ensure_bookable(&p, Pillar::MentalHealth, day(10), day(9)).is_err());
        assert!(ensure_bookable(&p, Pillar::LegalAssistance, day(8), day(9)).is_err());

        let mut unapproved = prestador();
        unapproved.is_approved = false;
        assert!(ensure_bookable(&unapproved, Pillar::LegalAssistance, day(10), day(9)).is_err());
    }

    #[test]
    fn listing_scope_follows_role() {
        let mut profile = Profile::minimal(Uuid::new_v4(), "x@y.pt");
        assert_eq!(
            BookingScope::for_profile(&profile).unwrap().user_id,
            Some(profile.id)
        );

        profile.role = Role::Hr;
        assert!(BookingScope::for_profile(&profile).is_err());
        let company_id = Uuid::new_v4();
        profile.company_id = Some(company_id);
        assert_eq!(
            BookingScope::for_profile(&profile).unwrap().company_id,
            Some(company_id)
        );

        profile.role = Role::Admin;
        assert_eq!(BookingScope::for_profile(&profile).unwrap(), BookingScope::default());
    }

    #[test]
    fn only_provider_completes_but_owner_may_cancel() {
        let owner = Profile::minimal(Uuid::new_v4(), "ana@acme.pt");
        let provider = Profile::minimal(Uuid::new_v4(), "rui@clinica.pt");
        let booking = booking_for(owner.id);

        let as_owner = Relation::of(&owner, &booking, Some(provider.id));
        assert!(as_owner.can_set_status(BookingStatus::Cancelled));
        assert!(!as_owner.can_set_status(BookingStatus::Completed));
        assert!(!as_owner.can_read_clinical());

        let as_provider = Relation::of(&provider, &booking, Some(provider.id));
        assert!(as_provider.can_set_status(BookingStatus::Completed));
        assert!(as_provider.can_read_clinical());

        let stranger = Profile::minimal(Uuid::new_v4(), "z@z.pt");
        assert!(!Relation::of(&stranger, &booking, Some(provider.id)).can_view());
    }

    #[test]
    fn referral_booker_keeps_access() {
        let specialist = Profile::minimal(Uuid::new_v4(), "esp@wellness.pt");
        let mut booking = booking_for(Uuid::new_v4());
        booking.booked_by = Some(specialist.id);
        let relation = Relation::of(&specialist, &booking, None);
        assert!(relation.booker);
        assert!(relation.can_read_clinical());
        assert!(relation.can_reschedule());
    }

    #[test]
    fn missing_wizard_fields_are_named() {
        let draft = BookingDraft {
            pillar: Some(Pillar::MentalHealth),
            ..Default::default()
        };
        match ensure_draft_complete(&draft, WizardFlow::SelfBooking) {
            Err(Error::BadRequest(msg)) => {
                assert!(msg.contains("prestador_id"));
                assert!(msg.contains("time"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn terminal_transitions_become_conflicts() {
        let err = BookingStatus::Cancelled
            .plan_transition(BookingStatus::Completed, false)
            .map_err(transition_error)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m.contains("cancelada")));
    }
}
