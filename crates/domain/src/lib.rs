//! Domain layer for the Site Console backend.
//!
//! This crate contains:
//! - Domain models (settings, change history, audit log, feature flags)
//! - The settings value codec
//! - Pure business logic (change diffing, audit filtering, export, stats)

pub mod models;
pub mod services;
