//! HTTP route handlers.

pub mod audit_logs;
pub mod health;
pub mod history;
pub mod settings;
