pub mod admin;
pub mod auth;
pub mod booking_wizard;
pub mod bookings;
pub mod companies;
pub mod health;
pub mod matching;
pub mod me;
pub mod navigation;
pub mod notifications;
pub mod prestadores;
pub mod resources;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};

use crate::{
    middleware::{
        auth::{require_admin, require_auth, require_hr_or_admin},
        rate_limit::{new_rps_state, rps_middleware},
    },
    AppState,
};

/// All `/api` routes with their auth layers, bound to `state`.
pub fn api_router(state: AppState, rps: u32) -> Router {
    let public_api = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/confirm", post(auth::confirm_email))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/update-password", post(auth::update_password))
        .route("/api/auth/redeem-access-code", post(auth::redeem_access_code))
        .route("/api/navigation/menu", get(navigation::menu))
        .route("/api/navigation/route-access", get(navigation::route_access_check))
        .route("/api/prestadores", get(prestadores::list_prestadores))
        .route(
            "/api/prestadores/:id/availability",
            get(prestadores::availability),
        );

    let user_api = Router::new()
        .route("/api/me", get(me::get_me).patch(me::update_me))
        .route("/api/me/refresh", post(me::refresh_me))
        .route("/api/me/quota", get(me::quota))
        .route("/api/booking-wizard/advance", post(booking_wizard::advance))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/referral", post(bookings::create_referral))
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/status", post(bookings::transition_status))
        .route("/api/bookings/:id/reschedule", post(bookings::reschedule))
        .route("/api/bookings/:id/rating", patch(bookings::rate_booking))
        .route("/api/bookings/:id/notes", patch(bookings::session_notes))
        .route("/api/bookings/:id/chat", get(bookings::booking_chat))
        .route("/api/prestadores/:id", get(prestadores::get_prestador))
        .route(
            "/api/prestadores/:id/blocked-dates",
            get(prestadores::list_blocked_dates).post(prestadores::block_date),
        )
        .route(
            "/api/prestadores/:id/blocked-dates/:block_id",
            delete(prestadores::unblock_date),
        )
        .route("/api/resources", get(resources::list_resources))
        .route("/api/resources/:id", get(resources::get_resource))
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let company_api = Router::new()
        .route("/api/companies/:id", get(companies::get_company))
        .route("/api/companies/:id/usage", get(companies::company_usage))
        .route("/api/companies/:id/employees", get(companies::list_employees))
        .route(
            "/api/companies/:id/employees/import",
            post(companies::import_employees),
        )
        .route(
            "/api/companies/:id/employees/export",
            get(companies::export_employees),
        )
        .route(
            "/api/companies/:id/employees/:employee_id",
            patch(companies::update_employee).delete(companies::remove_employee),
        )
        .route_layer(from_fn(require_hr_or_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_api = Router::new()
        .route(
            "/api/admin/companies",
            get(companies::admin_list_companies).post(companies::admin_create_company),
        )
        .route(
            "/api/admin/companies/:id",
            get(companies::get_company)
                .patch(companies::admin_update_company)
                .delete(companies::admin_delete_company),
        )
        .route(
            "/api/admin/prestadores",
            get(prestadores::admin_list_prestadores).post(prestadores::admin_create_prestador),
        )
        .route(
            "/api/admin/prestadores/:id",
            patch(prestadores::admin_update_prestador),
        )
        .route("/api/admin/resources", post(resources::admin_create_resource))
        .route(
            "/api/admin/resources/:id",
            patch(resources::admin_update_resource).delete(resources::admin_delete_resource),
        )
        .route(
            "/api/admin/resources/:id/thumbnail",
            post(resources::admin_upload_thumbnail),
        )
        .route("/api/admin/matching", get(matching::list_weights))
        .route("/api/admin/matching/:pillar", axum::routing::put(matching::set_weights))
        .route("/api/admin/matching/:pillar/simulate", get(matching::simulate))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id", patch(admin::update_user))
        .route("/api/admin/logs", get(admin::list_logs))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    public_api
        .merge(user_api)
        .merge(company_api)
        .merge(admin_api)
        .layer(from_fn_with_state(new_rps_state(rps), rps_middleware))
        .with_state(state)
}
