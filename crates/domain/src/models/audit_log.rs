//! Audit log domain models.
//!
//! The audit log is a trail of user actions (logins, settings changes,
//! exports). It is distinct from change history, which tracks data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Capacity of the client-side audit ring buffer.
pub const AUDIT_LOG_CAPACITY: usize = 1000;

/// Maximum number of entries returned by a single server query.
pub const MAX_AUDIT_QUERY_LIMIT: i64 = 1000;

/// Default number of entries returned by a server query.
pub const DEFAULT_AUDIT_QUERY_LIMIT: i64 = 100;

/// Well-known audit actions. Entries store the action as free text so
/// callers can log actions outside this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    Logout,
    SettingsChange,
    DataExport,
    VersionRevert,
    TrackingChange,
    HistoryPrune,
    LogsCleared,
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(AuditAction::Login),
            "logout" => Ok(AuditAction::Logout),
            "settings_change" => Ok(AuditAction::SettingsChange),
            "data_export" => Ok(AuditAction::DataExport),
            "version_revert" => Ok(AuditAction::VersionRevert),
            "tracking_change" => Ok(AuditAction::TrackingChange),
            "history_prune" => Ok(AuditAction::HistoryPrune),
            "logs_cleared" => Ok(AuditAction::LogsCleared),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::SettingsChange => "settings_change",
            AuditAction::DataExport => "data_export",
            AuditAction::VersionRevert => "version_revert",
            AuditAction::TrackingChange => "tracking_change",
            AuditAction::HistoryPrune => "history_prune",
            AuditAction::LogsCleared => "logs_cleared",
        };
        write!(f, "{}", s)
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default)]
    pub details: JsonValue,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

/// Who is acting and from where; attached to every entry written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditLogEntry {
    /// Create an entry stamped with the current time and a fresh id.
    pub fn new(action: impl Into<String>, details: JsonValue, context: &AuditContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: context.user_id.clone(),
            user_role: context.user_role.clone(),
            action: action.into(),
            entity: None,
            details,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            session_id: context.session_id.clone(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Filter over audit entries. All present criteria must match.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Substring of the user id.
    pub user_id: Option<String>,
    /// Substring of the action.
    pub action: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "limit must be between 1 and 1000"))]
    pub limit: Option<i64>,
}

impl AuditLogFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(start) = self.start_date {
            if entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if entry.timestamp > end {
                return false;
            }
        }
        if let Some(ref needle) = self.user_id {
            match entry.user_id {
                Some(ref user) if user.contains(needle.as_str()) => {}
                _ => return false,
            }
        }
        if let Some(ref needle) = self.action {
            if !entry.action.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }

    /// Apply the filter and limit to entries already ordered newest first.
    pub fn apply<'a, I>(&self, entries: I) -> Vec<AuditLogEntry>
    where
        I: IntoIterator<Item = &'a AuditLogEntry>,
    {
        let limit = self.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        entries
            .into_iter()
            .filter(|e| self.matches(e))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Export file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[default]
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

/// Aggregate counts over a set of audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogStats {
    pub total: usize,
    pub last_24h: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_user: BTreeMap<String, usize>,
}

/// Request body for `POST /audit-logs`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditLogRequest {
    #[validate(length(min = 1, max = 100, message = "action must be 1-100 characters"))]
    pub action: String,
    #[validate(length(max = 100, message = "entity must be at most 100 characters"))]
    pub entity: Option<String>,
    #[serde(default)]
    pub details: JsonValue,
}

/// Query parameters for the audit export endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAuditLogsQuery {
    pub format: Option<ExportFormat>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub action: Option<String>,
}

impl ExportAuditLogsQuery {
    /// Convert to a filter capped at `max_records`.
    pub fn to_filter(&self, max_records: i64) -> AuditLogFilter {
        AuditLogFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            user_id: self.user_id.clone(),
            action: self.action.clone(),
            limit: Some(max_records),
        }
    }
}

/// Response for listing audit logs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAuditLogsResponse {
    pub data: Vec<AuditLogEntry>,
    pub count: usize,
}
