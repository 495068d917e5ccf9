pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    admin_log_service::AdminLogService, auth_service::AuthService,
    availability_service::AvailabilityService, booking_service::BookingService,
    chat_service::ChatService, company_service::CompanyService,
    employee_service::EmployeeService, matching_service::MatchingService,
    notification_service::NotificationService, prestador_service::PrestadorService,
    profile_service::ProfileService, resource_service::ResourceService,
    session_events::SessionEvents, storage_service::StorageService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub profile_service: ProfileService,
    pub auth_service: AuthService,
    pub availability_service: AvailabilityService,
    pub prestador_service: PrestadorService,
    pub booking_service: BookingService,
    pub company_service: CompanyService,
    pub employee_service: EmployeeService,
    pub resource_service: ResourceService,
    pub matching_service: MatchingService,
    pub notification_service: NotificationService,
    pub admin_log_service: AdminLogService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let profile_service = ProfileService::new(pool.clone(), SessionEvents::new(256));
        let notification_service = NotificationService::new(pool.clone());
        let auth_service = AuthService::new(
            pool.clone(),
            profile_service.clone(),
            notification_service.clone(),
            config,
        );
        let availability_service =
            AvailabilityService::new(pool.clone(), config.slot_start_hour, config.slot_end_hour);
        let prestador_service = PrestadorService::new(pool.clone(), profile_service.clone());
        let booking_service = BookingService::new(
            pool.clone(),
            availability_service.clone(),
            prestador_service.clone(),
            profile_service.clone(),
            ChatService::new(pool.clone()),
            notification_service.clone(),
        );
        let company_service = CompanyService::new(pool.clone());
        let employee_service = EmployeeService::new(pool.clone());
        let storage = StorageService::new(config.uploads_dir.clone(), &config.public_base_url);
        let resource_service = ResourceService::new(pool.clone(), storage);
        let matching_service = MatchingService::new(pool.clone());
        let admin_log_service = AdminLogService::new(pool.clone());

        Self {
            pool,
            profile_service,
            auth_service,
            availability_service,
            prestador_service,
            booking_service,
            company_service,
            employee_service,
            resource_service,
            matching_service,
            notification_service,
            admin_log_service,
        }
    }
}
