//! Repository implementations for database operations.

pub mod audit_log;
pub mod history;
pub mod setting;

pub use audit_log::AuditLogRepository;
pub use history::{HistoryError, HistoryRepository};
pub use setting::{SetSettingsOutcome, SettingRepository, SETTINGS_TABLE};
