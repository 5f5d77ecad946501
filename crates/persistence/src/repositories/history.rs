//! Change history repository: recorder, trigger tracking and revert.

use domain::models::{
    BulkRevertResult, HistoryAction, HistoryQuery, HistoryRecord, NewHistoryRecord,
    RecordChangeSummary, RevertFailure, RevertSuccess,
};
use domain::services::history::{changed_fields, summarize};
use serde_json::Value as JsonValue;
use shared::validation::is_safe_identifier;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::db::set_acting_user;
use crate::entities::{HistoryActionDb, HistoryEntity};
use crate::metrics::QueryTimer;

/// Table holding history rows. It can never be tracked itself.
pub const HISTORY_TABLE: &str = "change_history";

/// Timeline length when the caller gives none.
pub const DEFAULT_TIMELINE_LIMIT: i64 = 50;

/// Upper bound for a single timeline query.
pub const MAX_TIMELINE_LIMIT: i64 = 500;

/// Bookkeeping columns a revert stamps afresh instead of copying back.
const UPDATED_BY_COLUMN: &str = "updated_by";
const UPDATED_AT_COLUMN: &str = "updated_at";

const HISTORY_COLUMNS: &str = "id, table_name, record_id, action, old_data, new_data, \
                               changed_fields, changed_by, changed_at";

/// Errors raised by the recorder and the revert engine.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Version not found")]
    VersionNotFound,

    #[error("No data available to restore")]
    NoDataToRestore,

    #[error("Record {record_id} no longer exists in {table_name}")]
    RecordNotFound { table_name: String, record_id: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Table {0} cannot be tracked")]
    NotTrackable(String),

    #[error("A history record needs old or new data")]
    EmptySnapshot,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Name of the tracking trigger installed on `table`.
pub fn trigger_name(table: &str) -> String {
    format!("{}_history_trigger", table)
}

fn ensure_identifier(name: &str) -> Result<(), HistoryError> {
    if is_safe_identifier(name) {
        Ok(())
    } else {
        Err(HistoryError::InvalidIdentifier(name.to_string()))
    }
}

/// Snapshot columns a revert copies back: those still on the table, minus
/// `id` and the bookkeeping columns.
fn restore_columns(
    snapshot: &serde_json::Map<String, JsonValue>,
    existing: &[String],
) -> Result<Vec<String>, HistoryError> {
    let mut columns = Vec::new();
    for column in snapshot.keys() {
        let skipped = matches!(column.as_str(), "id" | UPDATED_BY_COLUMN | UPDATED_AT_COLUMN);
        if skipped || !existing.contains(column) {
            continue;
        }
        ensure_identifier(column)?;
        columns.push(column.clone());
    }
    Ok(columns)
}

/// `UPDATE` that copies `columns` from a JSON image bound as `$1` onto the
/// row whose id (as text) is `$2`, returning the new row image. With
/// `touch_updated_at` the row's `updated_at` is set to `NOW()`.
fn build_restore_statement(table: &str, columns: &[String], touch_updated_at: bool) -> String {
    let mut assignments = columns
        .iter()
        .map(|c| format!("\"{c}\" = r.\"{c}\""))
        .collect::<Vec<_>>();
    if touch_updated_at {
        assignments.push(format!("\"{UPDATED_AT_COLUMN}\" = NOW()"));
    }
    let assignments = assignments.join(", ");

    format!(
        "UPDATE \"{table}\" AS t SET {assignments} \
         FROM jsonb_populate_record(NULL::\"{table}\", $1) AS r \
         WHERE t.id::text = $2 \
         RETURNING to_jsonb(t.*)"
    )
}

/// Helper struct for building dynamic WHERE clauses from history filters.
struct HistoryFilterBuilder {
    conditions: Vec<String>,
    param_count: i32,
}

impl HistoryFilterBuilder {
    fn build(query: &HistoryQuery) -> Self {
        let mut conditions = vec!["TRUE".to_string()];
        let mut param_count = 0;

        if query.table_name.is_some() {
            param_count += 1;
            conditions.push(format!("table_name = ${}", param_count));
        }
        if query.changed_by.is_some() {
            param_count += 1;
            conditions.push(format!("changed_by = ${}", param_count));
        }
        if query.action.is_some() {
            param_count += 1;
            conditions.push(format!("action = ${}", param_count));
        }
        if query.from.is_some() {
            param_count += 1;
            conditions.push(format!("changed_at >= ${}", param_count));
        }
        if query.to.is_some() {
            param_count += 1;
            conditions.push(format!("changed_at <= ${}", param_count));
        }

        Self {
            conditions,
            param_count,
        }
    }

    fn where_clause(&self) -> String {
        self.conditions.join(" AND ")
    }
}

/// Binds the optional history filters in the order `HistoryFilterBuilder` numbers them.
macro_rules! bind_history_filters {
    ($builder:expr, $query:expr) => {{
        let mut b = $builder;
        if let Some(ref table_name) = $query.table_name {
            b = b.bind(table_name);
        }
        if let Some(ref changed_by) = $query.changed_by {
            b = b.bind(changed_by);
        }
        if let Some(action) = $query.action {
            b = b.bind(HistoryActionDb::from(action));
        }
        if let Some(ref from) = $query.from {
            b = b.bind(from);
        }
        if let Some(ref to) = $query.to {
            b = b.bind(to);
        }
        b
    }};
}

/// Repository for change history.
#[derive(Clone)]
pub struct HistoryRepository {
    pool: PgPool,
}

impl HistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    // Recorder
    // =========================================================================

    /// Write one history row on `conn`, normally inside the caller's transaction.
    ///
    /// Updates that change no field are skipped and return `None`.
    pub async fn record(
        conn: &mut PgConnection,
        input: NewHistoryRecord,
    ) -> Result<Option<HistoryRecord>, HistoryError> {
        if input.old_data.is_none() && input.new_data.is_none() {
            return Err(HistoryError::EmptySnapshot);
        }

        let fields = changed_fields(input.old_data.as_ref(), input.new_data.as_ref());
        if input.action == HistoryAction::Update && fields.is_empty() {
            return Ok(None);
        }

        let timer = QueryTimer::new("record_history");
        let result = sqlx::query_as::<_, HistoryEntity>(&format!(
            r#"
            INSERT INTO change_history
                (table_name, record_id, action, old_data, new_data, changed_fields, changed_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {HISTORY_COLUMNS}
            "#
        ))
        .bind(&input.table_name)
        .bind(&input.record_id)
        .bind(HistoryActionDb::from(input.action))
        .bind(&input.old_data)
        .bind(&input.new_data)
        .bind(&fields)
        .bind(&input.changed_by)
        .fetch_one(conn)
        .await;
        let entity = timer.finish(result)?;

        Ok(Some(entity.into()))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<HistoryRecord>, sqlx::Error> {
        let timer = QueryTimer::new("find_history_by_id");
        let result = sqlx::query_as::<_, HistoryEntity>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM change_history WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        Ok(timer.finish(result)?.map(Into::into))
    }

    /// Changes to one record, newest first.
    pub async fn get_change_timeline(
        &self,
        table_name: &str,
        record_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryRecord>, sqlx::Error> {
        let limit = limit
            .unwrap_or(DEFAULT_TIMELINE_LIMIT)
            .clamp(1, MAX_TIMELINE_LIMIT);

        let timer = QueryTimer::new("get_change_timeline");
        let result = sqlx::query_as::<_, HistoryEntity>(&format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM change_history
            WHERE table_name = $1 AND record_id = $2
            ORDER BY changed_at DESC, id
            LIMIT $3
            "#
        ))
        .bind(table_name)
        .bind(record_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        Ok(timer
            .finish(result)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Totals, contributors and per-field counts over every change to one record.
    pub async fn get_record_change_summary(
        &self,
        table_name: &str,
        record_id: &str,
    ) -> Result<RecordChangeSummary, sqlx::Error> {
        let timer = QueryTimer::new("get_record_change_summary");
        let result = sqlx::query_as::<_, HistoryEntity>(&format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM change_history
            WHERE table_name = $1 AND record_id = $2
            ORDER BY changed_at
            "#
        ))
        .bind(table_name)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await;

        let records: Vec<HistoryRecord> = timer
            .finish(result)?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(summarize(table_name, record_id, &records))
    }

    /// Recent history across tables, filtered and paginated.
    pub async fn list(&self, query: &HistoryQuery) -> Result<(Vec<HistoryRecord>, i64), sqlx::Error> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(50).clamp(1, 200);
        let offset = (page - 1) * per_page;

        let filter = HistoryFilterBuilder::build(query);
        let where_clause = filter.where_clause();

        let timer = QueryTimer::new("list_history");

        let count_query = format!("SELECT COUNT(*) FROM change_history WHERE {}", where_clause);
        let count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        let total = bind_history_filters!(count_builder, query)
            .fetch_one(&self.pool)
            .await;
        let total = match total {
            Ok(total) => total,
            Err(e) => return timer.finish(Err(e)),
        };

        let list_query = format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM change_history
            WHERE {}
            ORDER BY changed_at DESC, id
            LIMIT ${} OFFSET ${}
            "#,
            where_clause,
            filter.param_count + 1,
            filter.param_count + 2
        );
        let list_builder = sqlx::query_as::<_, HistoryEntity>(&list_query);
        let result = bind_history_filters!(list_builder, query)
            .bind(per_page)
            .bind(offset)
            .fetch_all(&self.pool)
            .await;

        let records = timer
            .finish(result)?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok((records, total))
    }

    /// Delete history older than `older_than_days`. Returns the number of rows removed.
    pub async fn prune_history(&self, older_than_days: u32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("prune_history");
        let result = sqlx::query(
            "DELETE FROM change_history WHERE changed_at < NOW() - make_interval(days => $1)",
        )
        .bind(older_than_days as i32)
        .execute(&self.pool)
        .await;

        let deleted = timer.finish(result)?.rows_affected();
        tracing::info!(deleted, older_than_days, "Pruned change history");
        Ok(deleted)
    }

    // =========================================================================
    // Trigger tracking
    // =========================================================================

    async fn table_columns(conn: &mut PgConnection, table_name: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table_name)
        .fetch_all(conn)
        .await
    }

    pub(crate) async fn trigger_exists(conn: &mut PgConnection, table_name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM pg_trigger t
                JOIN pg_class c ON c.oid = t.tgrelid
                JOIN pg_namespace n ON n.oid = c.relnamespace
                WHERE n.nspname = current_schema()
                  AND c.relname = $1
                  AND t.tgname = $2
            )
            "#,
        )
        .bind(table_name)
        .bind(trigger_name(table_name))
        .fetch_one(conn)
        .await
    }

    /// Whether `table_name` carries the history trigger.
    pub async fn is_table_tracked(&self, table_name: &str) -> Result<bool, HistoryError> {
        ensure_identifier(table_name)?;
        let mut conn = self.pool.acquire().await?;
        Ok(Self::trigger_exists(&mut conn, table_name).await?)
    }

    /// Install the history trigger on `table_name`.
    ///
    /// Returns `false` when the trigger was already present.
    pub async fn enable_table_tracking(&self, table_name: &str) -> Result<bool, HistoryError> {
        ensure_identifier(table_name)?;
        if table_name == HISTORY_TABLE {
            return Err(HistoryError::NotTrackable(table_name.to_string()));
        }

        let timer = QueryTimer::new("enable_table_tracking");
        let mut conn = self.pool.acquire().await?;

        let columns = Self::table_columns(&mut conn, table_name).await?;
        if !columns.iter().any(|c| c == "id") {
            return Err(HistoryError::NotTrackable(table_name.to_string()));
        }

        if Self::trigger_exists(&mut conn, table_name).await? {
            timer.record();
            return Ok(false);
        }

        let statement = format!(
            "CREATE TRIGGER \"{}\" AFTER INSERT OR UPDATE OR DELETE ON \"{}\" \
             FOR EACH ROW EXECUTE FUNCTION record_history()",
            trigger_name(table_name),
            table_name
        );
        let result = sqlx::query(&statement).execute(&mut *conn).await;
        timer.finish(result)?;

        tracing::info!(table = table_name, "Enabled change tracking");
        Ok(true)
    }

    /// Remove the history trigger from `table_name`.
    ///
    /// Returns `false` when there was no trigger to remove.
    pub async fn disable_table_tracking(&self, table_name: &str) -> Result<bool, HistoryError> {
        ensure_identifier(table_name)?;

        let timer = QueryTimer::new("disable_table_tracking");
        let mut conn = self.pool.acquire().await?;

        if !Self::trigger_exists(&mut conn, table_name).await? {
            timer.record();
            return Ok(false);
        }

        let statement = format!(
            "DROP TRIGGER IF EXISTS \"{}\" ON \"{}\"",
            trigger_name(table_name),
            table_name
        );
        let result = sqlx::query(&statement).execute(&mut *conn).await;
        timer.finish(result)?;

        tracing::info!(table = table_name, "Disabled change tracking");
        Ok(true)
    }

    // =========================================================================
    // Revert
    // =========================================================================

    /// Re-apply the row state captured by a history entry.
    ///
    /// The revert runs with `acting_user` as the transaction's acting user, so
    /// the trigger (or the recorder, for untracked tables) logs it as a change
    /// of its own. `updated_by` and `updated_at`, where the table has them,
    /// name the reverting user and the revert time rather than the snapshot's.
    /// Returns the restored row.
    pub async fn revert_to_version(
        &self,
        history_id: Uuid,
        acting_user: Option<&str>,
    ) -> Result<JsonValue, HistoryError> {
        let record = self
            .find_by_id(history_id)
            .await?
            .ok_or(HistoryError::VersionNotFound)?;

        let mut target = record
            .restore_target()
            .cloned()
            .ok_or(HistoryError::NoDataToRestore)?;

        let table_name = record.table_name.as_str();
        ensure_identifier(table_name)?;

        let timer = QueryTimer::new("revert_to_version");
        let mut tx = self.pool.begin().await?;

        // Columns dropped since the snapshot was taken are ignored.
        let existing = Self::table_columns(&mut tx, table_name).await?;
        let fields = target.as_object_mut().ok_or(HistoryError::NoDataToRestore)?;
        let mut columns = restore_columns(fields, &existing)?;
        if columns.is_empty() {
            return Err(HistoryError::NoDataToRestore);
        }
        if existing.iter().any(|c| c == UPDATED_BY_COLUMN) {
            fields.insert(
                UPDATED_BY_COLUMN.to_string(),
                acting_user.map_or(JsonValue::Null, |user| JsonValue::String(user.to_string())),
            );
            columns.push(UPDATED_BY_COLUMN.to_string());
        }
        let touch_updated_at = existing.iter().any(|c| c == UPDATED_AT_COLUMN);

        set_acting_user(&mut tx, acting_user).await?;

        let before = sqlx::query_scalar::<_, JsonValue>(&format!(
            "SELECT to_jsonb(t.*) FROM \"{table_name}\" AS t WHERE t.id::text = $1 FOR UPDATE"
        ))
        .bind(&record.record_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| HistoryError::RecordNotFound {
            table_name: table_name.to_string(),
            record_id: record.record_id.clone(),
        })?;

        let statement = build_restore_statement(table_name, &columns, touch_updated_at);
        let after = sqlx::query_scalar::<_, JsonValue>(&statement)
            .bind(&target)
            .bind(&record.record_id)
            .fetch_one(&mut *tx)
            .await?;

        if !Self::trigger_exists(&mut tx, table_name).await? {
            Self::record(
                &mut tx,
                NewHistoryRecord {
                    table_name: table_name.to_string(),
                    record_id: record.record_id.clone(),
                    action: HistoryAction::Update,
                    old_data: Some(before),
                    new_data: Some(after.clone()),
                    changed_by: acting_user.map(str::to_string),
                },
            )
            .await?;
        }

        tx.commit().await?;
        timer.record();

        tracing::info!(
            history_id = %history_id,
            table = table_name,
            record_id = %record.record_id,
            "Reverted record to history version"
        );

        Ok(after)
    }

    /// Revert each id independently. Failures are collected, never raised.
    pub async fn bulk_revert(&self, history_ids: &[Uuid], acting_user: Option<&str>) -> BulkRevertResult {
        let mut result = BulkRevertResult::default();

        for &history_id in history_ids {
            match self.revert_to_version(history_id, acting_user).await {
                Ok(record) => result.success.push(RevertSuccess { history_id, record }),
                Err(e) => {
                    tracing::warn!(history_id = %history_id, error = %e, "Bulk revert item failed");
                    result.failed.push(RevertFailure {
                        history_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        result
    }
}
