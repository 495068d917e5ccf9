pub mod admin_log_service;
pub mod auth_service;
pub mod availability_service;
pub mod booking_service;
pub mod booking_wizard;
pub mod chat_service;
pub mod company_service;
pub mod employee_service;
pub mod export_service;
pub mod matching_service;
pub mod navigation_service;
pub mod notification_service;
pub mod prestador_service;
pub mod profile_cache;
pub mod profile_service;
pub mod resource_service;
pub mod session_events;
pub mod storage_service;
