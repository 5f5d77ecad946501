//! Custom Axum extractors.

pub mod actor;

pub use actor::{Actor, SESSION_ID_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
