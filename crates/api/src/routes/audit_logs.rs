//! Audit log routes.
//!
//! `POST` is open to the console so it can mirror its local log; reading,
//! exporting and clearing require the admin key.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use domain::models::{
    AuditAction, AuditLogEntry, AuditLogFilter, CreateAuditLogRequest, ExportAuditLogsQuery,
    ListAuditLogsResponse,
};
use domain::services::audit::{export_entries, export_file_name};
use persistence::repositories::AuditLogRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;
use crate::middleware::metrics::record_audit_entry;

/// Query for `DELETE /audit-logs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearAuditLogsQuery {
    pub older_than_days: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearAuditLogsResponse {
    pub deleted: u64,
    pub older_than_days: u32,
}

/// Record an action reported by the console.
///
/// User, role, session, address and user agent come from the request, not
/// the body.
#[axum::debug_handler]
pub async fn create_audit_log(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateAuditLogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;

    let mut entry = AuditLogEntry::new(request.action, request.details, actor.context());
    entry.entity = request.entity;

    let repo = AuditLogRepository::new(state.pool.clone());
    let created = repo.insert(&entry).await?;
    record_audit_entry(&created.action);

    Ok((StatusCode::CREATED, Json(created)))
}

/// Entries matching the filter, newest first.
#[axum::debug_handler]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(filter): Query<AuditLogFilter>,
) -> Result<impl IntoResponse, ApiError> {
    filter.validate()?;
    validate_date_range(&filter)?;

    let repo = AuditLogRepository::new(state.pool.clone());
    let data = repo.list(&filter).await?;

    Ok((
        StatusCode::OK,
        Json(ListAuditLogsResponse {
            count: data.len(),
            data,
        }),
    ))
}

/// Totals over the whole audit log.
#[axum::debug_handler]
pub async fn get_audit_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let repo = AuditLogRepository::new(state.pool.clone());
    let stats = repo.stats().await?;

    Ok((StatusCode::OK, Json(stats)))
}

/// Download matching entries as CSV or JSON.
///
/// The export itself is recorded as a `data_export` entry.
#[axum::debug_handler]
pub async fn export_audit_logs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ExportAuditLogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format = query.format.unwrap_or_default();
    let filter = query.to_filter(state.config.client.export_max_records);
    validate_date_range(&filter)?;

    let repo = AuditLogRepository::new(state.pool.clone());
    let entries = repo.list(&filter).await?;

    let (body, content_type) = export_entries(&entries, format)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize export: {}", e)))?;
    let file_name = export_file_name(format, Utc::now());

    repo.insert_async(AuditLogEntry::new(
        AuditAction::DataExport.to_string(),
        json!({ "format": format, "records": entries.len() }),
        actor.context(),
    ));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    ))
}

/// Delete entries older than `olderThanDays`.
#[axum::debug_handler]
pub async fn clear_audit_logs(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ClearAuditLogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    shared::validation::validate_retention_days(query.older_than_days)
        .map_err(|_| ApiError::Validation("olderThanDays must be between 1 and 3650".into()))?;

    let repo = AuditLogRepository::new(state.pool.clone());
    let deleted = repo.delete_older_than(query.older_than_days).await?;

    repo.insert_async(AuditLogEntry::new(
        AuditAction::LogsCleared.to_string(),
        json!({ "olderThanDays": query.older_than_days, "deleted": deleted }),
        actor.context(),
    ));

    Ok((
        StatusCode::OK,
        Json(ClearAuditLogsResponse {
            deleted,
            older_than_days: query.older_than_days,
        }),
    ))
}

fn validate_date_range(filter: &AuditLogFilter) -> Result<(), ApiError> {
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(ApiError::Validation(
                "startDate must not be after endDate".to_string(),
            ));
        }
    }
    Ok(())
}
