pub mod auth_dto;
pub mod booking_dto;
pub mod company_dto;
pub mod matching_dto;
pub mod prestador_dto;
pub mod resource_dto;
