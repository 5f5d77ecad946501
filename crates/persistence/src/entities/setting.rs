//! Setting entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{SettingCategory, SettingDataType, SettingEntry};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for setting_data_type that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "setting_data_type", rename_all = "lowercase")]
pub enum SettingDataTypeDb {
    String,
    Boolean,
    Number,
    Json,
    Array,
}

impl From<SettingDataTypeDb> for SettingDataType {
    fn from(db: SettingDataTypeDb) -> Self {
        match db {
            SettingDataTypeDb::String => SettingDataType::String,
            SettingDataTypeDb::Boolean => SettingDataType::Boolean,
            SettingDataTypeDb::Number => SettingDataType::Number,
            SettingDataTypeDb::Json => SettingDataType::Json,
            SettingDataTypeDb::Array => SettingDataType::Array,
        }
    }
}

/// Database enum for setting_category that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "setting_category", rename_all = "lowercase")]
pub enum SettingCategoryDb {
    General,
    Security,
    Theme,
    Features,
    Notifications,
    Business,
}

impl From<SettingCategoryDb> for SettingCategory {
    fn from(db: SettingCategoryDb) -> Self {
        match db {
            SettingCategoryDb::General => SettingCategory::General,
            SettingCategoryDb::Security => SettingCategory::Security,
            SettingCategoryDb::Theme => SettingCategory::Theme,
            SettingCategoryDb::Features => SettingCategory::Features,
            SettingCategoryDb::Notifications => SettingCategory::Notifications,
            SettingCategoryDb::Business => SettingCategory::Business,
        }
    }
}

/// Database row mapping for the settings table.
#[derive(Debug, Clone, FromRow)]
pub struct SettingEntity {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub category: SettingCategoryDb,
    pub data_type: SettingDataTypeDb,
    pub description: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SettingEntity> for SettingEntry {
    fn from(entity: SettingEntity) -> Self {
        Self {
            key: entity.key,
            value: entity.value,
            category: entity.category.into(),
            data_type: entity.data_type.into(),
            description: entity.description,
            updated_at: entity.updated_at,
            updated_by: entity.updated_by,
        }
    }
}

/// A settings row locked for update, with its full JSON image for history.
#[derive(Debug, Clone, FromRow)]
pub struct SettingSnapshotEntity {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub data_type: SettingDataTypeDb,
    pub snapshot: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_to_entry() {
        let now = Utc::now();
        let entity = SettingEntity {
            id: Uuid::new_v4(),
            key: "maintenance_mode".to_string(),
            value: "false".to_string(),
            category: SettingCategoryDb::Security,
            data_type: SettingDataTypeDb::Boolean,
            description: "Show the maintenance page".to_string(),
            updated_by: Some("auth0|owner".to_string()),
            created_at: now,
            updated_at: now,
        };

        let entry: SettingEntry = entity.into();
        assert_eq!(entry.key, "maintenance_mode");
        assert_eq!(entry.category, SettingCategory::Security);
        assert_eq!(entry.data_type, SettingDataType::Boolean);
        assert_eq!(entry.updated_by.as_deref(), Some("auth0|owner"));
    }

    #[test]
    fn test_data_type_conversion() {
        assert_eq!(SettingDataType::from(SettingDataTypeDb::Array), SettingDataType::Array);
        assert_eq!(SettingDataType::from(SettingDataTypeDb::Number), SettingDataType::Number);
    }
}
