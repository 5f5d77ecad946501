//! Change history domain models.
//!
//! A history record is an immutable before/after snapshot of one row,
//! captured whenever a tracked table mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Kind of row mutation captured by a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Insert,
    Update,
    Delete,
}

impl FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" => Ok(HistoryAction::Insert),
            "update" => Ok(HistoryAction::Update),
            "delete" => Ok(HistoryAction::Delete),
            _ => Err(format!("Unknown history action: {}", s)),
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryAction::Insert => write!(f, "insert"),
            HistoryAction::Update => write!(f, "update"),
            HistoryAction::Delete => write!(f, "delete"),
        }
    }
}

/// Snapshot of a row mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: Uuid,
    pub table_name: String,
    pub record_id: String,
    pub action: HistoryAction,
    pub old_data: Option<JsonValue>,
    pub new_data: Option<JsonValue>,
    pub changed_fields: Vec<String>,
    pub changed_by: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// The row state a revert should re-apply: `new_data` when present, else `old_data`.
    pub fn restore_target(&self) -> Option<&JsonValue> {
        self.new_data.as_ref().or(self.old_data.as_ref())
    }
}

/// Input for recording a row mutation.
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub table_name: String,
    pub record_id: String,
    pub action: HistoryAction,
    pub old_data: Option<JsonValue>,
    pub new_data: Option<JsonValue>,
    pub changed_by: Option<String>,
}

/// Aggregate view of every change made to one record.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordChangeSummary {
    pub table_name: String,
    pub record_id: String,
    pub total_changes: usize,
    pub first_changed_at: Option<DateTime<Utc>>,
    pub last_changed_at: Option<DateTime<Utc>>,
    pub contributors: Vec<String>,
    pub field_change_counts: BTreeMap<String, usize>,
    pub action_counts: BTreeMap<String, usize>,
}

/// Query parameters for the change timeline of a record.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    #[validate(range(min = 1, max = 500, message = "limit must be between 1 and 500"))]
    pub limit: Option<i64>,
}

/// Filter for listing recent history across tables.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub table_name: Option<String>,
    pub changed_by: Option<String>,
    pub action: Option<HistoryAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 200, message = "perPage must be between 1 and 200"))]
    pub per_page: Option<i64>,
}

/// Paginated history listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListHistoryResponse {
    pub data: Vec<HistoryRecord>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Request body for bulk revert.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkRevertRequest {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 history ids are required"))]
    pub history_ids: Vec<Uuid>,
}

/// A successfully reverted history entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertSuccess {
    pub history_id: Uuid,
    pub record: JsonValue,
}

/// A history entry that could not be reverted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertFailure {
    pub history_id: Uuid,
    pub error: String,
}

/// Per-id outcome of a bulk revert.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRevertResult {
    pub success: Vec<RevertSuccess>,
    pub failed: Vec<RevertFailure>,
}

/// Response after toggling trigger tracking on a table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResponse {
    pub table_name: String,
    pub tracked: bool,
    /// False when the table was already in the requested state.
    pub changed: bool,
}

/// Response after pruning old history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneHistoryResponse {
    pub deleted: u64,
    pub older_than_days: u32,
}
