//! Feature flag client.
//!
//! Flags come from the `featureFlags` object of `GET /settings`. A fetched
//! set is served from memory for `cache_ttl`, and a copy is persisted with
//! its fetch time. When the server cannot be reached the persisted copy is
//! used while younger than `stale_ttl`; past that every flag is off. The
//! fallback answer is also held in memory for `cache_ttl`, so an unreachable
//! server is not asked again on every read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use domain::models::{
    ClientOptions, FeatureFlag, FeatureFlagSet, DEFAULT_CLIENT_REQUEST_TIMEOUT_SECS,
    DEFAULT_FLAG_CACHE_TTL_SECS, DEFAULT_FLAG_STALE_TTL_SECS,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::storage::{load_json, store_json, KeyValueStorage};

/// Storage key of the persisted flag copy.
pub const DEFAULT_STORAGE_KEY: &str = "site_console.feature_flags";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(DEFAULT_FLAG_CACHE_TTL_SECS);
pub const DEFAULT_STALE_TTL: Duration = Duration::from_secs(DEFAULT_FLAG_STALE_TTL_SECS);
pub const DEFAULT_FETCH_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_CLIENT_REQUEST_TIMEOUT_SECS);

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum FeatureFlagError {
    #[error("Feature flag request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Settings endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid settings response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct FeatureFlagClientConfig {
    /// Full URL of the public `GET /settings` endpoint.
    pub settings_url: String,
    pub cache_ttl: Duration,
    pub stale_ttl: Duration,
    pub fetch_timeout: Duration,
    pub storage_key: String,
}

impl FeatureFlagClientConfig {
    pub fn new(settings_url: impl Into<String>) -> Self {
        Self {
            settings_url: settings_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            stale_ttl: DEFAULT_STALE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }

    /// Config using the options the server publishes on `GET /settings`.
    pub fn from_options(settings_url: impl Into<String>, options: &ClientOptions) -> Self {
        Self {
            cache_ttl: Duration::from_secs(options.feature_flag_cache_ttl_secs),
            stale_ttl: Duration::from_secs(options.feature_flag_stale_ttl_secs),
            fetch_timeout: Duration::from_secs(options.request_timeout_secs),
            ..Self::new(settings_url)
        }
    }
}

/// A flag set with the moment it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedFlags {
    flags: FeatureFlagSet,
    fetched_at: DateTime<Utc>,
}

impl CachedFlags {
    fn age(&self) -> Duration {
        // A timestamp in the future counts as just fetched.
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }
}

/// What reads are answered with until `cache_ttl` runs out.
#[derive(Debug, Clone)]
struct MemoryEntry {
    flags: FeatureFlagSet,
    stored_at: Instant,
    /// Last successful fetch; its age drives the stale fallback.
    fetched: Option<CachedFlags>,
}

// ============================================================================
// Client
// ============================================================================

pub struct FeatureFlagClient {
    http: Client,
    config: FeatureFlagClientConfig,
    storage: Arc<dyn KeyValueStorage>,
    cache: RwLock<Option<MemoryEntry>>,
}

impl FeatureFlagClient {
    pub fn new(
        config: FeatureFlagClientConfig,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, FeatureFlagError> {
        let http = Client::builder().timeout(config.fetch_timeout).build()?;

        Ok(Self {
            http,
            config,
            storage,
            cache: RwLock::new(None),
        })
    }

    /// Current flags. Never fails; see the module docs for the fallback order.
    pub async fn get_flags(&self) -> FeatureFlagSet {
        if let Some(entry) = self.cache.read().await.as_ref() {
            if entry.stored_at.elapsed() < self.config.cache_ttl {
                return entry.flags;
            }
        }

        match self.fetch().await {
            Ok(flags) => {
                self.remember(flags).await;
                flags
            }
            Err(e) => {
                warn!(error = %e, "Feature flag fetch failed, using fallback");
                let flags = self.fallback().await;
                self.hold_fallback(flags).await;
                flags
            }
        }
    }

    pub async fn is_enabled(&self, flag: FeatureFlag) -> bool {
        self.get_flags().await.is_enabled(flag)
    }

    /// Drop the in-memory copy so the next read goes to the server.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Fetch the flags from the server, bypassing every cache.
    pub async fn fetch(&self) -> Result<FeatureFlagSet, FeatureFlagError> {
        let response = self
            .http
            .get(&self.config.settings_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeatureFlagError::Timeout(self.config.fetch_timeout)
                } else {
                    FeatureFlagError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeatureFlagError::Status(status.as_u16()));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| FeatureFlagError::InvalidResponse(e.to_string()))?;

        let flags = body
            .get("featureFlags")
            .cloned()
            .ok_or_else(|| FeatureFlagError::InvalidResponse("missing featureFlags".into()))?;

        serde_json::from_value(flags).map_err(|e| FeatureFlagError::InvalidResponse(e.to_string()))
    }

    async fn remember(&self, flags: FeatureFlagSet) {
        let cached = CachedFlags {
            flags,
            fetched_at: Utc::now(),
        };

        if let Err(e) = store_json(self.storage.as_ref(), &self.config.storage_key, &cached).await {
            warn!(error = %e, "Could not persist feature flags");
        }
        *self.cache.write().await = Some(MemoryEntry {
            flags,
            stored_at: Instant::now(),
            fetched: Some(cached),
        });
    }

    /// Serve the fallback from memory without refreshing the stored fetch time.
    async fn hold_fallback(&self, flags: FeatureFlagSet) {
        let mut cache = self.cache.write().await;
        let fetched = cache.take().and_then(|entry| entry.fetched);
        *cache = Some(MemoryEntry {
            flags,
            stored_at: Instant::now(),
            fetched,
        });
    }

    async fn fallback(&self) -> FeatureFlagSet {
        let persisted = match load_json::<CachedFlags>(self.storage.as_ref(), &self.config.storage_key).await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "Persisted feature flags unreadable");
                None
            }
        };
        let in_memory = self
            .cache
            .read()
            .await
            .as_ref()
            .and_then(|entry| entry.fetched.clone());

        let freshest = [persisted, in_memory]
            .into_iter()
            .flatten()
            .max_by_key(|c| c.fetched_at);

        match freshest {
            Some(cached) if cached.age() < self.config.stale_ttl => {
                debug!(age_secs = cached.age().as_secs(), "Serving stale feature flags");
                cached.flags
            }
            _ => {
                debug!("No usable feature flag copy, serving defaults");
                FeatureFlagSet::default()
            }
        }
    }
}
