//! Audit log export and statistics.
//!
//! Shared by the server endpoints and the client-side writer so both
//! produce identical files.

use chrono::{DateTime, Duration, Utc};
use shared::csv::csv_row;

use crate::models::{AuditLogEntry, AuditLogStats, ExportFormat};

/// Column order of CSV exports.
pub const CSV_HEADER: [&str; 10] = [
    "id",
    "timestamp",
    "userId",
    "userRole",
    "action",
    "entity",
    "details",
    "ipAddress",
    "userAgent",
    "sessionId",
];

/// Render entries in the requested format.
///
/// Returns the document and its content type.
pub fn export_entries(
    entries: &[AuditLogEntry],
    format: ExportFormat,
) -> Result<(String, &'static str), serde_json::Error> {
    match format {
        ExportFormat::Json => Ok((serde_json::to_string_pretty(entries)?, "application/json")),
        ExportFormat::Csv => Ok((to_csv(entries), "text/csv")),
    }
}

/// Render entries as CSV with a header row.
pub fn to_csv(entries: &[AuditLogEntry]) -> String {
    let mut csv = csv_row(CSV_HEADER);
    csv.push('\n');

    for entry in entries {
        let details = if entry.details.is_null() {
            String::new()
        } else {
            entry.details.to_string()
        };
        csv.push_str(&csv_row([
            entry.id.to_string(),
            entry.timestamp.to_rfc3339(),
            entry.user_id.clone().unwrap_or_default(),
            entry.user_role.clone().unwrap_or_default(),
            entry.action.clone(),
            entry.entity.clone().unwrap_or_default(),
            details,
            entry.ip_address.clone().unwrap_or_default(),
            entry.user_agent.clone().unwrap_or_default(),
            entry.session_id.clone().unwrap_or_default(),
        ]));
        csv.push('\n');
    }

    csv
}

/// Count entries overall, in the 24 hours before `now`, per action and per user.
pub fn compute_stats<'a, I>(entries: I, now: DateTime<Utc>) -> AuditLogStats
where
    I: IntoIterator<Item = &'a AuditLogEntry>,
{
    let day_ago = now - Duration::hours(24);
    let mut stats = AuditLogStats::default();

    for entry in entries {
        stats.total += 1;
        if entry.timestamp >= day_ago {
            stats.last_24h += 1;
        }
        *stats.by_action.entry(entry.action.clone()).or_insert(0) += 1;
        let user = entry.user_id.clone().unwrap_or_else(|| "anonymous".to_string());
        *stats.by_user.entry(user).or_insert(0) += 1;
    }

    stats
}

/// Suggested download file name for an export.
pub fn export_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    let ext = match format {
        ExportFormat::Csv => "csv",
        ExportFormat::Json => "json",
    };
    format!("audit-logs-{}.{}", now.format("%Y-%m-%d"), ext)
}
