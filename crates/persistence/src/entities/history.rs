//! Change history entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{HistoryAction, HistoryRecord};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for history_action that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "history_action", rename_all = "lowercase")]
pub enum HistoryActionDb {
    Insert,
    Update,
    Delete,
}

impl From<HistoryActionDb> for HistoryAction {
    fn from(db: HistoryActionDb) -> Self {
        match db {
            HistoryActionDb::Insert => HistoryAction::Insert,
            HistoryActionDb::Update => HistoryAction::Update,
            HistoryActionDb::Delete => HistoryAction::Delete,
        }
    }
}

impl From<HistoryAction> for HistoryActionDb {
    fn from(action: HistoryAction) -> Self {
        match action {
            HistoryAction::Insert => HistoryActionDb::Insert,
            HistoryAction::Update => HistoryActionDb::Update,
            HistoryAction::Delete => HistoryActionDb::Delete,
        }
    }
}

/// Database row mapping for the change_history table.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryEntity {
    pub id: Uuid,
    pub table_name: String,
    pub record_id: String,
    pub action: HistoryActionDb,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_fields: Vec<String>,
    pub changed_by: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl From<HistoryEntity> for HistoryRecord {
    fn from(entity: HistoryEntity) -> Self {
        Self {
            id: entity.id,
            table_name: entity.table_name,
            record_id: entity.record_id,
            action: entity.action.into(),
            old_data: entity.old_data,
            new_data: entity.new_data,
            changed_fields: entity.changed_fields,
            changed_by: entity.changed_by,
            changed_at: entity.changed_at,
        }
    }
}
