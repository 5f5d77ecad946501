//! Conversion between the raw stored form of a setting and its typed value.
//!
//! Decoding never fails: anything that cannot be interpreted as the declared
//! data type is handed back unchanged as `SettingValue::String`.

use serde_json::Value as JsonValue;

use crate::models::{SettingDataType, SettingValue};

/// Decode a raw stored value according to its declared data type.
pub fn decode(raw: &str, data_type: SettingDataType) -> SettingValue {
    match data_type {
        SettingDataType::String => SettingValue::String(raw.to_string()),
        SettingDataType::Boolean => SettingValue::Bool(is_truthy(raw)),
        SettingDataType::Number => match parse_number(raw) {
            Some(n) => SettingValue::Number(n),
            None => passthrough(raw),
        },
        SettingDataType::Json => match serde_json::from_str::<JsonValue>(raw) {
            Ok(value) => SettingValue::Json(value),
            Err(_) => passthrough(raw),
        },
        SettingDataType::Array => match serde_json::from_str::<JsonValue>(raw) {
            Ok(JsonValue::Array(items)) => SettingValue::Array(items),
            _ => passthrough(raw),
        },
    }
}

/// Encode a typed value into its raw stored form for the given data type.
///
/// Values whose variant does not match the data type are coerced.
pub fn encode(value: &SettingValue, data_type: SettingDataType) -> String {
    match data_type {
        SettingDataType::String => display(value),
        SettingDataType::Boolean => {
            let b = match value {
                SettingValue::Bool(b) => *b,
                SettingValue::String(s) => is_truthy(s),
                SettingValue::Number(n) => *n != 0.0,
                SettingValue::Json(JsonValue::Bool(b)) => *b,
                _ => false,
            };
            let raw = if b { "true" } else { "false" };
            raw.to_string()
        }
        SettingDataType::Number => match value {
            SettingValue::Number(n) => format_number(*n),
            SettingValue::Bool(true) => "1".to_string(),
            SettingValue::Bool(false) => "0".to_string(),
            SettingValue::String(s) => match parse_number(s) {
                Some(n) => format_number(n),
                None => s.clone(),
            },
            other => display(other),
        },
        SettingDataType::Json | SettingDataType::Array => match value {
            SettingValue::String(s) => s.clone(),
            other => other.to_json().to_string(),
        },
    }
}

/// `"true"` and `"1"` are true; everything else is false.
pub fn is_truthy(raw: &str) -> bool {
    raw == "true" || raw == "1"
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn format_number(n: f64) -> String {
    // f64 Display is the shortest string that parses back to the same value.
    n.to_string()
}

fn display(value: &SettingValue) -> String {
    match value {
        SettingValue::String(s) => s.clone(),
        SettingValue::Bool(b) => b.to_string(),
        SettingValue::Number(n) => format_number(*n),
        SettingValue::Json(v) => v.to_string(),
        SettingValue::Array(items) => JsonValue::Array(items.clone()).to_string(),
    }
}

fn passthrough(raw: &str) -> SettingValue {
    tracing::debug!(raw, "Setting value did not match its data type, passing through");
    SettingValue::String(raw.to_string())
}
