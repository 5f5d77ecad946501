//! Capped client-side audit log.
//!
//! Entries are kept newest first in a ring of fixed capacity and persisted
//! to a [`KeyValueStorage`] after every write. Logging is best effort:
//! [`AuditLogWriter::log`] never fails, storage and network problems are
//! reported through `tracing`. [`AuditLogWriter::try_log`] surfaces them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::models::{
    AuditAction, AuditContext, AuditLogEntry, AuditLogFilter, AuditLogStats, ClientOptions,
    ExportFormat,
};
use domain::services::audit::{compute_stats, export_entries, export_file_name};
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

use crate::storage::{load_json, store_json, KeyValueStorage, StorageError};

/// Storage key under which the entries are persisted.
pub const DEFAULT_STORAGE_KEY: &str = "site_console.audit_logs";

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Export failed: {0}")]
    Export(#[from] serde_json::Error),
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct AuditLogWriterConfig {
    /// Maximum number of entries kept; the oldest are dropped first.
    pub capacity: usize,
    pub storage_key: String,
    /// Full URL of the server's `POST /audit-logs` endpoint. When set every
    /// entry is mirrored there in the background.
    pub server_endpoint: Option<String>,
    pub request_timeout: Duration,
}

impl Default for AuditLogWriterConfig {
    fn default() -> Self {
        Self::from(&ClientOptions::default())
    }
}

/// Capacity and timeout from the options published on `GET /settings`.
impl From<&ClientOptions> for AuditLogWriterConfig {
    fn from(options: &ClientOptions) -> Self {
        Self {
            capacity: options.audit_log_capacity,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            server_endpoint: None,
            request_timeout: Duration::from_secs(options.request_timeout_secs),
        }
    }
}

/// An export ready to be saved or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedLogs {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: String,
}

// ============================================================================
// Writer
// ============================================================================

pub struct AuditLogWriter {
    storage: Arc<dyn KeyValueStorage>,
    config: AuditLogWriterConfig,
    context: RwLock<AuditContext>,
    entries: Mutex<VecDeque<AuditLogEntry>>,
    events: broadcast::Sender<AuditLogEntry>,
    http: Option<Client>,
}

impl AuditLogWriter {
    /// Create a writer, restoring previously persisted entries.
    ///
    /// Unreadable or corrupt stored data is discarded with a warning.
    pub async fn open(
        storage: Arc<dyn KeyValueStorage>,
        config: AuditLogWriterConfig,
        context: AuditContext,
    ) -> Result<Self, AuditLogError> {
        let http = match config.server_endpoint {
            Some(_) => Some(Client::builder().timeout(config.request_timeout).build()?),
            None => None,
        };

        let mut entries: VecDeque<AuditLogEntry> =
            match load_json::<Vec<AuditLogEntry>>(storage.as_ref(), &config.storage_key).await {
                Ok(Some(stored)) => stored.into(),
                Ok(None) => VecDeque::new(),
                Err(e) => {
                    warn!(error = %e, key = %config.storage_key, "Discarding unreadable audit log");
                    VecDeque::new()
                }
            };
        entries.truncate(config.capacity);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            storage,
            config,
            context: RwLock::new(context),
            entries: Mutex::new(entries),
            events,
            http,
        })
    }

    /// Replace the user/session context stamped on new entries.
    pub async fn set_context(&self, context: AuditContext) {
        *self.context.write().await = context;
    }

    pub async fn context(&self) -> AuditContext {
        self.context.read().await.clone()
    }

    /// Receive every entry written from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditLogEntry> {
        self.events.subscribe()
    }

    /// Record an action. Never fails; persistence problems are logged.
    ///
    /// `user_id` overrides the user of the current context.
    pub async fn log(
        &self,
        action: impl Into<String>,
        details: JsonValue,
        user_id: Option<&str>,
    ) -> AuditLogEntry {
        let entry = self.build_entry(action.into(), details, user_id).await;
        if let Err(e) = self.append(entry.clone()).await {
            warn!(action = %entry.action, error = %e, "Audit log entry was not persisted");
        }
        entry
    }

    /// Like [`log`](Self::log) but reports storage failures.
    ///
    /// On error the entry is still held in memory and broadcast.
    pub async fn try_log(
        &self,
        action: impl Into<String>,
        details: JsonValue,
        user_id: Option<&str>,
    ) -> Result<AuditLogEntry, AuditLogError> {
        let entry = self.build_entry(action.into(), details, user_id).await;
        self.append(entry.clone()).await?;
        Ok(entry)
    }

    async fn build_entry(
        &self,
        action: String,
        details: JsonValue,
        user_id: Option<&str>,
    ) -> AuditLogEntry {
        let context = self.context.read().await;
        let entry = AuditLogEntry::new(action, details, &context);
        match user_id {
            Some(user) => entry.with_user(user),
            None => entry,
        }
    }

    async fn append(&self, entry: AuditLogEntry) -> Result<(), StorageError> {
        let persisted = {
            let mut entries = self.entries.lock().await;
            entries.push_front(entry.clone());
            entries.truncate(self.config.capacity);
            self.persist(&entries).await
        };

        // No subscribers is not an error.
        let _ = self.events.send(entry.clone());
        self.mirror(entry);

        persisted
    }

    async fn persist(&self, entries: &VecDeque<AuditLogEntry>) -> Result<(), StorageError> {
        store_json(self.storage.as_ref(), &self.config.storage_key, entries).await
    }

    fn mirror(&self, entry: AuditLogEntry) {
        let (Some(client), Some(endpoint)) = (self.http.clone(), self.config.server_endpoint.clone())
        else {
            return;
        };

        tokio::spawn(async move {
            let mut request = client.post(&endpoint).json(&json!({
                "action": entry.action,
                "entity": entry.entity,
                "details": entry.details,
            }));
            if let Some(ref user) = entry.user_id {
                request = request.header("X-User-Id", user);
            }
            if let Some(ref role) = entry.user_role {
                request = request.header("X-User-Role", role);
            }
            if let Some(ref session) = entry.session_id {
                request = request.header("X-Session-Id", session);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(action = %entry.action, "Mirrored audit log entry");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Audit log mirror rejected entry");
                }
                Err(e) => {
                    warn!(error = %e, "Audit log mirror unreachable");
                }
            }
        });
    }

    /// Entries matching `filter`, newest first.
    pub async fn get_logs(&self, filter: &AuditLogFilter) -> Vec<AuditLogEntry> {
        filter.apply(self.entries.lock().await.iter())
    }

    /// Render matching entries as CSV or JSON. The export itself is logged.
    pub async fn export_logs(
        &self,
        format: ExportFormat,
        filter: &AuditLogFilter,
    ) -> Result<ExportedLogs, AuditLogError> {
        let entries = self.get_logs(filter).await;
        let (body, content_type) = export_entries(&entries, format)?;

        self.log(
            AuditAction::DataExport.to_string(),
            json!({ "format": format, "count": entries.len() }),
            None,
        )
        .await;

        Ok(ExportedLogs {
            file_name: export_file_name(format, Utc::now()),
            content_type,
            body,
        })
    }

    /// Remove entries older than `older_than_days`, or every entry when `None`.
    ///
    /// Returns the number of entries removed.
    pub async fn clear_logs(&self, older_than_days: Option<u32>) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();

        match older_than_days {
            Some(days) => {
                let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
                entries.retain(|e| e.timestamp >= cutoff);
            }
            None => entries.clear(),
        }

        let removed = before - entries.len();
        if let Err(e) = self.persist(&entries).await {
            warn!(error = %e, "Cleared audit log was not persisted");
        }
        removed
    }

    /// Counts overall, for the last 24 hours, per action and per user.
    pub async fn stats(&self) -> AuditLogStats {
        compute_stats(self.entries.lock().await.iter(), Utc::now())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
