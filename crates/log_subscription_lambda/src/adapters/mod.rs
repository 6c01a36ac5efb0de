pub mod inventory;
pub mod log_service;
pub mod tracking_table;
