//! Domain models for Site Console.

pub mod audit_log;
pub mod client_options;
pub mod feature_flags;
pub mod history;
pub mod setting;

pub use audit_log::*;
pub use client_options::*;
pub use feature_flags::*;
pub use history::*;
pub use setting::*;
