//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod audit_log;
pub mod history;
pub mod setting;

pub use audit_log::AuditLogEntity;
pub use history::{HistoryActionDb, HistoryEntity};
pub use setting::{SettingCategoryDb, SettingDataTypeDb, SettingEntity, SettingSnapshotEntity};
