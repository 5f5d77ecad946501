//! Shared utilities and common types for the Site Console backend.
//!
//! This crate provides common functionality used across all other crates:
//! - API key hashing and comparison
//! - Identifier and setting key validation
//! - CSV export helpers

pub mod crypto;
pub mod csv;
pub mod validation;
