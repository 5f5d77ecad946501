//! Change history routes: timelines, revert and trigger tracking.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use domain::models::{
    AuditAction, AuditLogEntry, BulkRevertRequest, HistoryQuery, ListHistoryResponse,
    PruneHistoryResponse, TimelineQuery, TrackingResponse,
};
use persistence::repositories::{AuditLogRepository, HistoryRepository};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;
use crate::middleware::metrics::record_revert;

/// Query for `DELETE /history`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneHistoryQuery {
    pub older_than_days: Option<u32>,
}

/// Recent history across tables.
#[axum::debug_handler]
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.validate()?;
    if let Some(ref table) = query.table_name {
        ensure_table_name(table)?;
    }

    let repo = HistoryRepository::new(state.pool.clone());
    let (data, total) = repo.list(&query).await?;

    Ok((
        StatusCode::OK,
        Json(ListHistoryResponse {
            data,
            page: query.page.unwrap_or(1).max(1),
            per_page: query.per_page.unwrap_or(50).clamp(1, 200),
            total,
        }),
    ))
}

/// Changes to one record, newest first.
#[axum::debug_handler]
pub async fn get_change_timeline(
    State(state): State<AppState>,
    Path((table_name, record_id)): Path<(String, String)>,
    Query(query): Query<TimelineQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.validate()?;
    ensure_table_name(&table_name)?;

    let repo = HistoryRepository::new(state.pool.clone());
    let timeline = repo
        .get_change_timeline(&table_name, &record_id, query.limit)
        .await?;

    Ok((StatusCode::OK, Json(timeline)))
}

/// Totals and contributors for one record.
#[axum::debug_handler]
pub async fn get_record_change_summary(
    State(state): State<AppState>,
    Path((table_name, record_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_table_name(&table_name)?;

    let repo = HistoryRepository::new(state.pool.clone());
    let summary = repo
        .get_record_change_summary(&table_name, &record_id)
        .await?;

    Ok((StatusCode::OK, Json(summary)))
}

/// Restore the row state captured by one history entry.
#[axum::debug_handler]
pub async fn revert_to_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(history_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = HistoryRepository::new(state.pool.clone());

    let record = match repo.revert_to_version(history_id, actor.user_id()).await {
        Ok(record) => {
            record_revert("success");
            record
        }
        Err(e) => {
            record_revert("failed");
            return Err(e.into());
        }
    };

    AuditLogRepository::new(state.pool.clone()).insert_async(
        AuditLogEntry::new(
            AuditAction::VersionRevert.to_string(),
            json!({ "historyId": history_id }),
            actor.context(),
        )
        .with_entity("change_history"),
    );

    Ok((StatusCode::OK, Json(record)))
}

/// Revert several entries. Each id succeeds or fails on its own.
#[axum::debug_handler]
pub async fn bulk_revert(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<BulkRevertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;

    let repo = HistoryRepository::new(state.pool.clone());
    let result = repo.bulk_revert(&request.history_ids, actor.user_id()).await;

    for _ in &result.success {
        record_revert("success");
    }
    for _ in &result.failed {
        record_revert("failed");
    }

    if !result.success.is_empty() {
        let reverted: Vec<Uuid> = result.success.iter().map(|s| s.history_id).collect();
        AuditLogRepository::new(state.pool.clone()).insert_async(
            AuditLogEntry::new(
                AuditAction::VersionRevert.to_string(),
                json!({ "historyIds": reverted, "failed": result.failed.len() }),
                actor.context(),
            )
            .with_entity("change_history"),
        );
    }

    Ok((StatusCode::OK, Json(result)))
}

/// Whether a table carries the history trigger.
#[axum::debug_handler]
pub async fn get_tracking(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = HistoryRepository::new(state.pool.clone());
    let tracked = repo.is_table_tracked(&table_name).await?;

    Ok((
        StatusCode::OK,
        Json(TrackingResponse {
            table_name,
            tracked,
            changed: false,
        }),
    ))
}

/// Install the history trigger on a table.
#[axum::debug_handler]
pub async fn enable_tracking(
    State(state): State<AppState>,
    actor: Actor,
    Path(table_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = HistoryRepository::new(state.pool.clone());
    let changed = repo.enable_table_tracking(&table_name).await?;
    audit_tracking_change(&state, &actor, &table_name, true, changed);

    Ok((
        StatusCode::OK,
        Json(TrackingResponse {
            table_name,
            tracked: true,
            changed,
        }),
    ))
}

/// Remove the history trigger from a table.
#[axum::debug_handler]
pub async fn disable_tracking(
    State(state): State<AppState>,
    actor: Actor,
    Path(table_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = HistoryRepository::new(state.pool.clone());
    let changed = repo.disable_table_tracking(&table_name).await?;
    audit_tracking_change(&state, &actor, &table_name, false, changed);

    Ok((
        StatusCode::OK,
        Json(TrackingResponse {
            table_name,
            tracked: false,
            changed,
        }),
    ))
}

/// Delete history older than `olderThanDays` (default: the configured retention).
#[axum::debug_handler]
pub async fn prune_history(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<PruneHistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let older_than_days = query
        .older_than_days
        .unwrap_or(state.config.history.retention_days);
    shared::validation::validate_retention_days(older_than_days)
        .map_err(|_| ApiError::Validation("olderThanDays must be between 1 and 3650".into()))?;

    let repo = HistoryRepository::new(state.pool.clone());
    let deleted = repo.prune_history(older_than_days).await?;

    AuditLogRepository::new(state.pool.clone()).insert_async(AuditLogEntry::new(
        AuditAction::HistoryPrune.to_string(),
        json!({ "olderThanDays": older_than_days, "deleted": deleted }),
        actor.context(),
    ));

    Ok((
        StatusCode::OK,
        Json(PruneHistoryResponse {
            deleted,
            older_than_days,
        }),
    ))
}

fn ensure_table_name(table_name: &str) -> Result<(), ApiError> {
    shared::validation::validate_identifier(table_name)
        .map_err(|e| ApiError::Validation(e.to_string()))
}

fn audit_tracking_change(state: &AppState, actor: &Actor, table_name: &str, tracked: bool, changed: bool) {
    if !changed {
        return;
    }
    AuditLogRepository::new(state.pool.clone()).insert_async(
        AuditLogEntry::new(
            AuditAction::TrackingChange.to_string(),
            json!({ "table": table_name, "tracked": tracked }),
            actor.context(),
        )
        .with_entity(table_name),
    );
}
