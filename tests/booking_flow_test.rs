use std::env;

use chrono::{Duration, NaiveDate, NaiveTime};
use sqlx::PgPool;
use uuid::Uuid;
use wellness_backend::dto::booking_dto::{CreateBookingPayload, ReschedulePayload};
use wellness_backend::error::Error;
use wellness_backend::models::booking::{BookingStatus, MeetingPlatform, PayerSource};
use wellness_backend::models::pillar::Pillar;
use wellness_backend::models::profile::Profile;
use wellness_backend::utils::time::today;
use wellness_backend::AppState;

/// Needs a reachable Postgres at `DATABASE_URL`; without one the flow is skipped.
async fn setup() -> Option<AppState> {
    dotenvy::dotenv().ok();
    if env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping booking flow test");
        return None;
    }
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    let _ = wellness_backend::config::init_config();

    let pool = match wellness_backend::database::pool::create_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("database unreachable ({}), skipping booking flow test", e);
            return None;
        }
    };
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Some(AppState::new(pool))
}

async fn seed_user(pool: &PgPool, name: &str, company_id: Option<Uuid>, personal_sessions: i32) -> Uuid {
    let id = Uuid::new_v4();
    let email = format!("{}_{}@exemplo.pt", name.to_lowercase(), id.simple());
    sqlx::query(
        "INSERT INTO auth_users (id, email, password_hash, email_confirmed_at) VALUES ($1, $2, 'x', NOW())",
    )
    .bind(id)
    .bind(&email)
    .execute(pool)
    .await
    .expect("seed auth user");
    sqlx::query(
        r#"INSERT INTO profiles (id, email, name, company_id, personal_sessions_allocated)
           VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(id)
    .bind(&email)
    .bind(name)
    .bind(company_id)
    .bind(personal_sessions)
    .execute(pool)
    .await
    .expect("seed profile");
    id
}

async fn seed_prestador(pool: &PgPool) -> (Uuid, Uuid) {
    let user_id = seed_user(pool, "Marta", None, 0).await;
    let prestador_id = sqlx::query_scalar::<_, Uuid>(
        r#"INSERT INTO prestadores (user_id, name, email, pillars, available_weekdays, is_approved)
           VALUES ($1, 'Dra. Marta', $2, '{mental_health}', '{1,2,3,4,5,6,7}', TRUE)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(format!("marta_{}@clinica.pt", user_id.simple()))
    .fetch_one(pool)
    .await
    .expect("seed prestador");
    (prestador_id, user_id)
}

async fn seed_company(pool: &PgPool, sessions: i32, contract_end: Option<NaiveDate>) -> Uuid {
    let nif: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    sqlx::query_scalar::<_, Uuid>(
        r#"INSERT INTO companies (name, nif, sessions_allocated, contract_end_date)
           VALUES ('Acme Lda', $1, $2, $3)
           RETURNING id"#,
    )
    .bind(nif)
    .bind(sessions)
    .bind(contract_end)
    .fetch_one(pool)
    .await
    .expect("seed company")
}

async fn profile(state: &AppState, id: Uuid) -> Profile {
    state
        .profile_service
        .get_by_id(id)
        .await
        .expect("load profile")
        .expect("profile exists")
}

async fn deducted_count(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE user_id = $1 AND was_deducted")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count deducted")
}

fn at(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

fn booking(prestador_id: Uuid, date: NaiveDate, hour: u32, payer_source: PayerSource) -> CreateBookingPayload {
    CreateBookingPayload {
        prestador_id,
        pillar: Pillar::MentalHealth,
        date,
        time: at(hour),
        payer_source,
        meeting_platform: MeetingPlatform::Zoom,
        topic: "Gestão de stress".into(),
        notes: None,
        chat_session_id: None,
    }
}

#[tokio::test]
async fn completion_deducts_personal_quota_exactly_once() {
    let Some(state) = setup().await else {
        return;
    };
    let pool = state.pool.clone();
    let bookings = &state.booking_service;
    let day = today() + Duration::days(30);

    let (prestador_id, provider_id) = seed_prestador(&pool).await;
    let provider = profile(&state, provider_id).await;
    let patient_id = seed_user(&pool, "Ana", None, 3).await;
    let patient = profile(&state, patient_id).await;

    let first = bookings
        .create(&patient, booking(prestador_id, day, 10, PayerSource::Personal))
        .await
        .expect("first booking");
    let cancelled = bookings
        .create(&patient, booking(prestador_id, day, 11, PayerSource::Personal))
        .await
        .expect("second booking");
    let missed = bookings
        .create(&patient, booking(prestador_id, day, 12, PayerSource::Personal))
        .await
        .expect("third booking");

    let over_quota = bookings
        .create(&patient, booking(prestador_id, day, 13, PayerSource::Personal))
        .await;
    assert!(matches!(over_quota, Err(Error::BadRequest(_))), "{:?}", over_quota);

    let completed = bookings
        .transition(&provider, first.id, BookingStatus::Completed, None)
        .await
        .expect("complete");
    assert_eq!(completed.status, BookingStatus::Completed);
    assert!(completed.was_deducted);
    assert!(completed.deducted_at.is_some());

    let again = bookings
        .transition(&provider, first.id, BookingStatus::Completed, None)
        .await;
    assert!(matches!(again, Err(Error::Conflict(_))), "{:?}", again);
    assert_eq!(profile(&state, patient_id).await.personal_sessions_used, 1);

    let cancelled = bookings
        .transition(
            &patient,
            cancelled.id,
            BookingStatus::Cancelled,
            Some("Imprevisto".into()),
        )
        .await
        .expect("cancel");
    assert!(!cancelled.was_deducted);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Imprevisto"));

    let missed = bookings
        .transition(&provider, missed.id, BookingStatus::NoShow, None)
        .await
        .expect("no show");
    assert!(!missed.was_deducted);
    assert_eq!(profile(&state, patient_id).await.personal_sessions_used, 1);

    let patient = profile(&state, patient_id).await;
    let moved = bookings
        .create(&patient, booking(prestador_id, day, 13, PayerSource::Personal))
        .await
        .expect("booking after releases");
    let rescheduled = bookings
        .reschedule(
            &patient,
            moved.id,
            ReschedulePayload {
                date: day,
                time: at(14),
                reason: None,
            },
        )
        .await
        .expect("reschedule");
    assert_eq!(rescheduled.previous.status, BookingStatus::Rescheduled);
    assert!(!rescheduled.previous.was_deducted);
    assert_eq!(rescheduled.booking.status, BookingStatus::Scheduled);
    assert_eq!(rescheduled.booking.rescheduled_from, Some(moved.id));
    assert_eq!(profile(&state, patient_id).await.personal_sessions_used, 1);

    bookings
        .transition(&provider, rescheduled.booking.id, BookingStatus::Completed, None)
        .await
        .expect("complete rescheduled");
    assert_eq!(profile(&state, patient_id).await.personal_sessions_used, 2);
    assert_eq!(deducted_count(&pool, patient_id).await, 2);

    // An allocation lowered after booking refuses the completion and rolls back.
    let patient = profile(&state, patient_id).await;
    let last = bookings
        .create(&patient, booking(prestador_id, day, 15, PayerSource::Personal))
        .await
        .expect("last booking");
    sqlx::query("UPDATE profiles SET personal_sessions_allocated = 2 WHERE id = $1")
        .bind(patient_id)
        .execute(&pool)
        .await
        .expect("lower allocation");
    let refused = bookings
        .transition(&provider, last.id, BookingStatus::Completed, None)
        .await;
    assert!(matches!(refused, Err(Error::Conflict(_))), "{:?}", refused);
    let last = bookings.get(last.id).await.expect("reload");
    assert_eq!(last.status, BookingStatus::Scheduled);
    assert!(!last.was_deducted);
    assert_eq!(profile(&state, patient_id).await.personal_sessions_used, 2);
}

#[tokio::test]
async fn company_bookings_respect_contract_and_pool() {
    let Some(state) = setup().await else {
        return;
    };
    let pool = state.pool.clone();
    let bookings = &state.booking_service;
    let day = today() + Duration::days(10);

    let (prestador_id, provider_id) = seed_prestador(&pool).await;
    let provider = profile(&state, provider_id).await;
    let company_id = seed_company(&pool, 1, Some(day + Duration::days(5))).await;
    let patient_id = seed_user(&pool, "Rui", Some(company_id), 0).await;
    let patient = profile(&state, patient_id).await;

    let held = bookings
        .create(&patient, booking(prestador_id, day, 10, PayerSource::Company))
        .await
        .expect("company booking");
    assert_eq!(held.company_id, Some(company_id));

    let second = bookings
        .create(&patient, booking(prestador_id, day, 11, PayerSource::Company))
        .await;
    assert!(matches!(second, Err(Error::BadRequest(_))), "{:?}", second);

    let past_contract = bookings
        .reschedule(
            &patient,
            held.id,
            ReschedulePayload {
                date: day + Duration::days(14),
                time: at(10),
                reason: None,
            },
        )
        .await;
    assert!(matches!(past_contract, Err(Error::BadRequest(_))), "{:?}", past_contract);
    assert_eq!(
        bookings.get(held.id).await.expect("reload").status,
        BookingStatus::Scheduled
    );

    let moved = bookings
        .reschedule(
            &patient,
            held.id,
            ReschedulePayload {
                date: day + Duration::days(1),
                time: at(10),
                reason: Some("Conflito de agenda".into()),
            },
        )
        .await
        .expect("reschedule inside contract");

    bookings
        .transition(&provider, moved.booking.id, BookingStatus::Completed, None)
        .await
        .expect("complete");
    let used = sqlx::query_scalar::<_, i32>("SELECT sessions_used FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_one(&pool)
        .await
        .expect("company usage");
    assert_eq!(used, 1);
    assert_eq!(deducted_count(&pool, patient_id).await, 1);
}
