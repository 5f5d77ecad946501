//! Site settings routes.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use domain::models::{
    AuditAction, AuditLogEntry, SettingEntriesResponse, SettingEntry, SettingValue,
    SettingsResponse, TypedSettingEntry, UpdateSettingsRequest, UpdateSettingsResponse,
};
use domain::services::value_codec;
use persistence::repositories::{AuditLogRepository, SettingRepository, SETTINGS_TABLE};
use serde_json::json;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Actor;
use crate::middleware::metrics::record_settings_updated;

/// Every setting flattened into one object, plus the feature flags and the
/// client options.
#[axum::debug_handler]
pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let repo = SettingRepository::new(state.pool.clone());
    let settings = repo.get_all().await?;
    let response =
        SettingsResponse::new(settings).with_client_options(state.config.client.options());

    Ok((StatusCode::OK, Json(response)))
}

/// Full settings rows grouped by category.
#[axum::debug_handler]
pub async fn get_setting_entries(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = SettingRepository::new(state.pool.clone());
    let entries = repo.get_all_entries().await?;

    Ok((StatusCode::OK, Json(group_entries(entries))))
}

/// Apply a partial settings object.
///
/// Values are re-encoded for each key's stored data type. Keys without a
/// settings row come back in `unknown`. A change is also written to the
/// audit log.
#[axum::debug_handler]
pub async fn update_settings(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;
    for key in request.settings.keys() {
        shared::validation::validate_setting_key(key).map_err(|e| {
            ApiError::Validation(
                e.message
                    .map(|m| format!("{}: {}", key, m))
                    .unwrap_or_else(|| format!("Invalid setting key: {}", key)),
            )
        })?;
    }

    let partial: BTreeMap<String, SettingValue> = request
        .settings
        .into_iter()
        .map(|(key, value)| (key, SettingValue::from(value)))
        .collect();

    let repo = SettingRepository::new(state.pool.clone());
    let outcome = repo.set_all(&partial, actor.user_id()).await?;
    record_settings_updated(outcome.updated.len());

    if !outcome.updated.is_empty() {
        let changes: serde_json::Map<String, serde_json::Value> = outcome
            .updated
            .iter()
            .filter_map(|key| partial.get(key).map(|v| (key.clone(), v.to_json())))
            .collect();
        let entry = AuditLogEntry::new(
            AuditAction::SettingsChange.to_string(),
            json!({ "keys": outcome.updated, "changes": changes }),
            actor.context(),
        )
        .with_entity(SETTINGS_TABLE);
        AuditLogRepository::new(state.pool.clone()).insert_async(entry);
    }

    let settings = repo.get_all().await?;
    let response = UpdateSettingsResponse {
        updated: outcome.updated,
        unknown: outcome.unknown,
        settings: SettingsResponse::new(settings),
    };

    Ok((StatusCode::OK, Json(response)))
}

fn group_entries(entries: Vec<SettingEntry>) -> SettingEntriesResponse {
    let total = entries.len();
    let mut categories: BTreeMap<_, Vec<TypedSettingEntry>> = BTreeMap::new();

    for entry in entries {
        let typed = TypedSettingEntry {
            value: value_codec::decode(&entry.value, entry.data_type),
            key: entry.key,
            category: entry.category,
            data_type: entry.data_type,
            description: entry.description,
            updated_at: entry.updated_at,
            updated_by: entry.updated_by,
        };
        categories.entry(typed.category).or_default().push(typed);
    }

    SettingEntriesResponse { categories, total }
}
