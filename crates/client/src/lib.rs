//! Client-side utilities for pages embedding the Site Console.
//!
//! This crate contains:
//! - A key/value storage abstraction (in-memory and file backed)
//! - The capped audit log writer
//! - The feature flag client with TTL cache and stale fallback
//!
//! Every component is constructed explicitly and shared through `Arc`;
//! there are no process-wide singletons.

pub mod audit_log;
pub mod feature_flags;
pub mod storage;

pub use audit_log::{AuditLogError, AuditLogWriter, AuditLogWriterConfig, ExportedLogs};
pub use feature_flags::{FeatureFlagClient, FeatureFlagClientConfig, FeatureFlagError};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
