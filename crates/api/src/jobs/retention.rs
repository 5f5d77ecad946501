//! Retention job for change history and the server audit log.

use persistence::repositories::{AuditLogRepository, HistoryRepository};
use sqlx::PgPool;
use tracing::info;

use super::scheduler::{Job, JobFrequency};

/// Deletes change history and audit entries past their retention window.
pub struct RetentionJob {
    history: HistoryRepository,
    audit_logs: AuditLogRepository,
    history_retention_days: u32,
    audit_retention_days: u32,
}

impl RetentionJob {
    pub fn new(pool: PgPool, history_retention_days: u32, audit_retention_days: u32) -> Self {
        Self {
            history: HistoryRepository::new(pool.clone()),
            audit_logs: AuditLogRepository::new(pool),
            history_retention_days,
            audit_retention_days,
        }
    }
}

#[async_trait::async_trait]
impl Job for RetentionJob {
    fn name(&self) -> &'static str {
        "retention"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let history_deleted = self
            .history
            .prune_history(self.history_retention_days)
            .await
            .map_err(|e| format!("Failed to prune change history: {}", e))?;

        let audit_deleted = self
            .audit_logs
            .delete_older_than(self.audit_retention_days)
            .await
            .map_err(|e| format!("Failed to prune audit logs: {}", e))?;

        info!(
            history_deleted,
            audit_deleted,
            history_retention_days = self.history_retention_days,
            audit_retention_days = self.audit_retention_days,
            "Retention cleanup finished"
        );
        Ok(())
    }
}
