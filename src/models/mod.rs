pub mod admin_log;
pub mod booking;
pub mod chat;
pub mod company;
pub mod employee;
pub mod matching;
pub mod notification;
pub mod pillar;
pub mod prestador;
pub mod profile;
pub mod resource;
