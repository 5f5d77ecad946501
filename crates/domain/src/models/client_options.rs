//! Tuning published to console utilities alongside the settings.

use serde::{Deserialize, Serialize};

use super::audit_log::AUDIT_LOG_CAPACITY;

pub const DEFAULT_FLAG_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_FLAG_STALE_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_CLIENT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Cache lifetimes, timeouts and buffer sizes for the console's feature-flag
/// client and audit log writer.
///
/// Served as `clientOptions` on `GET /settings`; missing fields fall back to
/// the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    pub feature_flag_cache_ttl_secs: u64,
    pub feature_flag_stale_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub audit_log_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            feature_flag_cache_ttl_secs: DEFAULT_FLAG_CACHE_TTL_SECS,
            feature_flag_stale_ttl_secs: DEFAULT_FLAG_STALE_TTL_SECS,
            request_timeout_secs: DEFAULT_CLIENT_REQUEST_TIMEOUT_SECS,
            audit_log_capacity: AUDIT_LOG_CAPACITY,
        }
    }
}
