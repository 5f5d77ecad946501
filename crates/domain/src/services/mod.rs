//! Domain services.

pub mod audit;
pub mod history;
pub mod value_codec;
