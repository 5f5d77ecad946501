//! Setting domain models for the site configuration table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::str::FromStr;
use validator::Validate;

use super::client_options::ClientOptions;
use super::feature_flags::FeatureFlagSet;

/// Data type for stored setting values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingDataType {
    String,
    Boolean,
    Number,
    Json,
    Array,
}

impl FromStr for SettingDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SettingDataType::String),
            "boolean" | "bool" => Ok(SettingDataType::Boolean),
            "number" => Ok(SettingDataType::Number),
            "json" => Ok(SettingDataType::Json),
            "array" => Ok(SettingDataType::Array),
            _ => Err(format!("Unknown setting data type: {}", s)),
        }
    }
}

impl std::fmt::Display for SettingDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingDataType::String => write!(f, "string"),
            SettingDataType::Boolean => write!(f, "boolean"),
            SettingDataType::Number => write!(f, "number"),
            SettingDataType::Json => write!(f, "json"),
            SettingDataType::Array => write!(f, "array"),
        }
    }
}

/// Category for grouping settings in the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingCategory {
    General,
    Security,
    Theme,
    Features,
    Notifications,
    Business,
}

impl FromStr for SettingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(SettingCategory::General),
            "security" => Ok(SettingCategory::Security),
            "theme" => Ok(SettingCategory::Theme),
            "features" => Ok(SettingCategory::Features),
            "notifications" => Ok(SettingCategory::Notifications),
            "business" => Ok(SettingCategory::Business),
            _ => Err(format!("Unknown setting category: {}", s)),
        }
    }
}

impl std::fmt::Display for SettingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingCategory::General => write!(f, "general"),
            SettingCategory::Security => write!(f, "security"),
            SettingCategory::Theme => write!(f, "theme"),
            SettingCategory::Features => write!(f, "features"),
            SettingCategory::Notifications => write!(f, "notifications"),
            SettingCategory::Business => write!(f, "business"),
        }
    }
}

/// A typed setting value.
///
/// Serializes as the plain JSON value (`true`, `5`, `"text"`, `[..]`, `{..}`).
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    String(String),
    Bool(bool),
    Number(f64),
    Json(JsonValue),
    Array(Vec<JsonValue>),
}

impl SettingValue {
    /// Convert to a JSON value. Integral numbers are emitted without a fraction.
    pub fn to_json(&self) -> JsonValue {
        match self {
            SettingValue::String(s) => JsonValue::String(s.clone()),
            SettingValue::Bool(b) => JsonValue::Bool(*b),
            SettingValue::Number(n) => number_to_json(*n),
            SettingValue::Json(v) => v.clone(),
            SettingValue::Array(items) => JsonValue::Array(items.clone()),
        }
    }

    /// Returns the boolean value, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the numeric value, if this is a `Number`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string value, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

impl From<JsonValue> for SettingValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::String(s) => SettingValue::String(s),
            JsonValue::Bool(b) => SettingValue::Bool(b),
            JsonValue::Number(n) => match n.as_f64() {
                Some(f) => SettingValue::Number(f),
                None => SettingValue::Json(JsonValue::Number(n)),
            },
            JsonValue::Array(items) => SettingValue::Array(items),
            other => SettingValue::Json(other),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        SettingValue::Number(n)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::String(s.to_string())
    }
}

impl Serialize for SettingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(SettingValue::from)
    }
}

/// A row of the settings table with its raw stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingEntry {
    pub key: String,
    pub value: String,
    pub category: SettingCategory,
    pub data_type: SettingDataType,
    pub description: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// A setting entry with its decoded value, used by the admin console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedSettingEntry {
    pub key: String,
    pub value: SettingValue,
    pub category: SettingCategory,
    pub data_type: SettingDataType,
    pub description: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// Flat settings object keyed by setting name.
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// Response for `GET /settings`: every setting flattened, plus the feature flags
/// and, when the server publishes them, the client options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub settings: SettingsMap,
    pub feature_flags: FeatureFlagSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_options: Option<ClientOptions>,
}

impl SettingsResponse {
    pub fn new(settings: SettingsMap) -> Self {
        let feature_flags = FeatureFlagSet::from_settings(&settings);
        Self {
            settings,
            feature_flags,
            client_options: None,
        }
    }

    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = Some(options);
        self
    }
}

/// Request body for `PUT /settings`: a partial settings object.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(length(min = 1, message = "At least one setting must be supplied"))]
    #[serde(flatten)]
    pub settings: BTreeMap<String, JsonValue>,
}

/// Response after updating settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsResponse {
    pub updated: Vec<String>,
    pub unknown: Vec<String>,
    pub settings: SettingsResponse,
}

/// Settings grouped by category for the admin console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingEntriesResponse {
    pub categories: BTreeMap<SettingCategory, Vec<TypedSettingEntry>>,
    pub total: usize,
}
