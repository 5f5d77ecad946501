//! Audit log entity.

use chrono::{DateTime, Utc};
use domain::models::AuditLogEntry;
use sqlx::FromRow;
use uuid::Uuid;

/// Database entity for audit logs.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLogEntity {
    pub id: Uuid,

    /// When the action occurred.
    pub timestamp: DateTime<Utc>,

    pub user_id: Option<String>,
    pub user_role: Option<String>,

    /// Free-text action name, e.g. `settings_change`.
    pub action: String,

    /// Kind of object acted upon, if any.
    pub entity: Option<String>,

    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl From<AuditLogEntity> for AuditLogEntry {
    fn from(entity: AuditLogEntity) -> Self {
        Self {
            id: entity.id,
            timestamp: entity.timestamp,
            user_id: entity.user_id,
            user_role: entity.user_role,
            action: entity.action,
            entity: entity.entity,
            details: entity.details,
            ip_address: entity.ip_address,
            user_agent: entity.user_agent,
            session_id: entity.session_id,
        }
    }
}
