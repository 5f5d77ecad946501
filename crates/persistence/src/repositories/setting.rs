//! Setting repository: the settings store adapter.

use std::collections::BTreeMap;

use domain::models::{HistoryAction, NewHistoryRecord, SettingEntry, SettingValue, SettingsMap};
use domain::services::value_codec;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::db::set_acting_user;
use crate::entities::{SettingEntity, SettingSnapshotEntity};
use crate::metrics::QueryTimer;
use crate::repositories::history::{HistoryError, HistoryRepository};

/// Name of the settings table as recorded in change history.
pub const SETTINGS_TABLE: &str = "settings";

/// Keys written and keys ignored by `set_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetSettingsOutcome {
    /// Keys whose stored value changed.
    pub updated: Vec<String>,
    /// Keys with no settings row; nothing was written for them.
    pub unknown: Vec<String>,
}

/// Repository for the settings table.
#[derive(Clone)]
pub struct SettingRepository {
    pool: PgPool,
}

impl SettingRepository {
    /// Creates a new SettingRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Every settings row with its raw stored value.
    pub async fn get_all_entries(&self) -> Result<Vec<SettingEntry>, sqlx::Error> {
        let timer = QueryTimer::new("get_all_settings");
        let result = sqlx::query_as::<_, SettingEntity>(
            r#"
            SELECT id, key, value, category, data_type, description,
                   updated_by, created_at, updated_at
            FROM settings
            ORDER BY category, key
            "#,
        )
        .fetch_all(&self.pool)
        .await;

        Ok(timer
            .finish(result)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn get_entry(&self, key: &str) -> Result<Option<SettingEntry>, sqlx::Error> {
        let timer = QueryTimer::new("get_setting");
        let result = sqlx::query_as::<_, SettingEntity>(
            r#"
            SELECT id, key, value, category, data_type, description,
                   updated_by, created_at, updated_at
            FROM settings
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await;

        Ok(timer.finish(result)?.map(Into::into))
    }

    /// All settings decoded and flattened into one map keyed by setting name.
    pub async fn get_all(&self) -> Result<SettingsMap, sqlx::Error> {
        let entries = self.get_all_entries().await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let value = value_codec::decode(&entry.value, entry.data_type);
                (entry.key, value)
            })
            .collect())
    }

    /// A single decoded setting.
    pub async fn get(&self, key: &str) -> Result<Option<SettingValue>, sqlx::Error> {
        Ok(self
            .get_entry(key)
            .await?
            .map(|entry| value_codec::decode(&entry.value, entry.data_type)))
    }

    /// Write a partial settings object.
    ///
    /// Each value is encoded for the data type stored on its row. All rows
    /// are updated in one transaction; keys without a row are reported in
    /// `unknown` and skipped. Rows whose encoded value is unchanged are not
    /// touched. Every write produces a history record.
    pub async fn set_all(
        &self,
        partial: &BTreeMap<String, SettingValue>,
        changed_by: Option<&str>,
    ) -> Result<SetSettingsOutcome, HistoryError> {
        let keys: Vec<String> = partial.keys().cloned().collect();
        let mut outcome = SetSettingsOutcome::default();

        let timer = QueryTimer::new("set_settings");
        let mut tx = self.pool.begin().await?;
        set_acting_user(&mut tx, changed_by).await?;

        let rows = sqlx::query_as::<_, SettingSnapshotEntity>(
            r#"
            SELECT s.id, s.key, s.value, s.data_type, to_jsonb(s.*) AS snapshot
            FROM settings s
            WHERE s.key = ANY($1)
            ORDER BY s.key
            FOR UPDATE
            "#,
        )
        .bind(&keys)
        .fetch_all(&mut *tx)
        .await?;
        let rows: BTreeMap<&str, &SettingSnapshotEntity> =
            rows.iter().map(|row| (row.key.as_str(), row)).collect();

        // The trigger records the update itself when the table is tracked.
        let trigger_tracked = HistoryRepository::trigger_exists(&mut tx, SETTINGS_TABLE).await?;

        for (key, value) in partial {
            let Some(row) = rows.get(key.as_str()) else {
                outcome.unknown.push(key.clone());
                continue;
            };

            let raw = value_codec::encode(value, row.data_type.into());
            if raw == row.value {
                continue;
            }

            let after = sqlx::query_scalar::<_, JsonValue>(
                r#"
                UPDATE settings
                SET value = $1, updated_by = $2, updated_at = NOW()
                WHERE id = $3
                RETURNING to_jsonb(settings.*)
                "#,
            )
            .bind(&raw)
            .bind(changed_by)
            .bind(row.id)
            .fetch_one(&mut *tx)
            .await?;

            if !trigger_tracked {
                HistoryRepository::record(
                    &mut tx,
                    NewHistoryRecord {
                        table_name: SETTINGS_TABLE.to_string(),
                        record_id: row.id.to_string(),
                        action: HistoryAction::Update,
                        old_data: Some(row.snapshot.clone()),
                        new_data: Some(after),
                        changed_by: changed_by.map(str::to_string),
                    },
                )
                .await?;
            }

            outcome.updated.push(key.clone());
        }

        tx.commit().await?;
        timer.record();

        if !outcome.unknown.is_empty() {
            tracing::warn!(unknown = ?outcome.unknown, "Ignored unknown setting keys");
        }
        tracing::info!(
            updated = outcome.updated.len(),
            changed_by = changed_by.unwrap_or("anonymous"),
            "Settings updated"
        );

        Ok(outcome)
    }
}
