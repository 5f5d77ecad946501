//! Audit log repository for database operations.

use domain::models::{AuditLogEntry, AuditLogFilter, AuditLogStats, DEFAULT_AUDIT_QUERY_LIMIT, MAX_AUDIT_QUERY_LIMIT};
use sqlx::PgPool;

use crate::entities::AuditLogEntity;
use crate::metrics::QueryTimer;

const AUDIT_COLUMNS: &str = "id, timestamp, user_id, user_role, action, entity, details, \
                             ip_address, user_agent, session_id";

/// Helper struct for building dynamic WHERE clauses from audit log filters.
/// User and action criteria are substring matches.
struct AuditLogFilterBuilder {
    conditions: Vec<String>,
    param_count: i32,
}

impl AuditLogFilterBuilder {
    fn build(filter: &AuditLogFilter) -> Self {
        let mut conditions = vec!["TRUE".to_string()];
        let mut param_count = 0;

        if filter.start_date.is_some() {
            param_count += 1;
            conditions.push(format!("timestamp >= ${}", param_count));
        }
        if filter.end_date.is_some() {
            param_count += 1;
            conditions.push(format!("timestamp <= ${}", param_count));
        }
        if filter.user_id.is_some() {
            param_count += 1;
            conditions.push(format!("strpos(user_id, ${}) > 0", param_count));
        }
        if filter.action.is_some() {
            param_count += 1;
            conditions.push(format!("strpos(action, ${}) > 0", param_count));
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

/// Binds the optional filter values in the order `AuditLogFilterBuilder` numbers them.
macro_rules! bind_audit_filters {
    ($builder:expr, $filter:expr) => {{
        let mut b = $builder;
        if let Some(ref start) = $filter.start_date {
            b = b.bind(start);
        }
        if let Some(ref end) = $filter.end_date {
            b = b.bind(end);
        }
        if let Some(ref user_id) = $filter.user_id {
            b = b.bind(user_id);
        }
        if let Some(ref action) = $filter.action {
            b = b.bind(action);
        }
        b
    }};
}

/// Repository for audit log database operations.
#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an audit log entry, keeping its id and timestamp.
    pub async fn insert(&self, entry: &AuditLogEntry) -> Result<AuditLogEntry, sqlx::Error> {
        let timer = QueryTimer::new("insert_audit_log");
        let result = sqlx::query_as::<_, AuditLogEntity>(&format!(
            r#"
            INSERT INTO audit_logs (
                id, timestamp, user_id, user_role, action, entity, details,
                ip_address, user_agent, session_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {AUDIT_COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(entry.timestamp)
        .bind(&entry.user_id)
        .bind(&entry.user_role)
        .bind(&entry.action)
        .bind(&entry.entity)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.session_id)
        .fetch_one(&self.pool)
        .await;

        Ok(timer.finish(result)?.into())
    }

    /// Insert an entry in the background. Failures are logged, never returned.
    pub fn insert_async(&self, entry: AuditLogEntry) {
        let repo = self.clone();
        tokio::spawn(async move {
            if let Err(e) = repo.insert(&entry).await {
                tracing::error!(action = %entry.action, error = %e, "Failed to insert audit log");
            }
        });
    }

    /// Entries matching `filter`, newest first.
    pub async fn list(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_AUDIT_QUERY_LIMIT)
            .clamp(1, MAX_AUDIT_QUERY_LIMIT);

        let builder = AuditLogFilterBuilder::build(filter);
        let list_query = format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_logs
            WHERE {}
            ORDER BY timestamp DESC, id
            LIMIT ${}
            "#,
            builder.where_clause(),
            builder.param_count + 1
        );

        let timer = QueryTimer::new("list_audit_logs");
        let query = sqlx::query_as::<_, AuditLogEntity>(&list_query);
        let result = bind_audit_filters!(query, filter)
            .bind(limit)
            .fetch_all(&self.pool)
            .await;

        Ok(timer
            .finish(result)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Counts over every stored entry.
    pub async fn stats(&self) -> Result<AuditLogStats, sqlx::Error> {
        let timer = QueryTimer::new("audit_log_stats");
        let result = self.stats_inner().await;
        timer.finish(result)
    }

    async fn stats_inner(&self) -> Result<AuditLogStats, sqlx::Error> {
        let (total, last_24h): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE timestamp >= NOW() - INTERVAL '24 hours')
            FROM audit_logs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let by_action: Vec<(String, i64)> = sqlx::query_as(
            "SELECT action, COUNT(*) FROM audit_logs GROUP BY action",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_user: Vec<(String, i64)> = sqlx::query_as(
            "SELECT COALESCE(user_id, 'anonymous'), COUNT(*) FROM audit_logs GROUP BY 1",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(AuditLogStats {
            total: total as usize,
            last_24h: last_24h as usize,
            by_action: by_action
                .into_iter()
                .map(|(action, count)| (action, count as usize))
                .collect(),
            by_user: by_user
                .into_iter()
                .map(|(user, count)| (user, count as usize))
                .collect(),
        })
    }

    /// Delete entries older than `older_than_days`. Returns the number removed.
    pub async fn delete_older_than(&self, older_than_days: u32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_old_audit_logs");
        let result = sqlx::query(
            "DELETE FROM audit_logs WHERE timestamp < NOW() - make_interval(days => $1)",
        )
        .bind(older_than_days as i32)
        .execute(&self.pool)
        .await;

        Ok(timer.finish(result)?.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_filter_builder_all_criteria() {
        let filter = AuditLogFilter {
            start_date: Some(Utc::now()),
            end_date: Some(Utc::now()),
            user_id: Some("alice".into()),
            action: Some("settings".into()),
            limit: Some(10),
        };
        let builder = AuditLogFilterBuilder::build(&filter);
        assert_eq!(
            builder.where_clause(),
            "TRUE AND timestamp >= $1 AND timestamp <= $2 AND strpos(user_id, $3) > 0 AND strpos(action, $4) > 0"
        );
        assert_eq!(builder.param_count, 4);
    }

    #[test]
    fn test_filter_builder_user_only() {
        let filter = AuditLogFilter {
            user_id: Some("bob".into()),
            ..Default::default()
        };
        let builder = AuditLogFilterBuilder::build(&filter);
        assert_eq!(builder.where_clause(), "TRUE AND strpos(user_id, $1) > 0");
    }
}
