//! Feature flag models.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::setting::SettingsMap;

/// Optional UI/behavior toggles exposed to the site.
///
/// All flags default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlagSet {
    pub beta_features: bool,
    pub new_dashboard: bool,
    pub advanced_reports: bool,
    pub enable_registration: bool,
    pub enable_guest_checkout: bool,
}

/// Individual feature flag identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlag {
    BetaFeatures,
    NewDashboard,
    AdvancedReports,
    EnableRegistration,
    EnableGuestCheckout,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 5] = [
        FeatureFlag::BetaFeatures,
        FeatureFlag::NewDashboard,
        FeatureFlag::AdvancedReports,
        FeatureFlag::EnableRegistration,
        FeatureFlag::EnableGuestCheckout,
    ];

    /// Key of the backing row in the settings table.
    pub fn setting_key(&self) -> &'static str {
        match self {
            FeatureFlag::BetaFeatures => "beta_features",
            FeatureFlag::NewDashboard => "new_dashboard",
            FeatureFlag::AdvancedReports => "advanced_reports",
            FeatureFlag::EnableRegistration => "enable_registration",
            FeatureFlag::EnableGuestCheckout => "enable_guest_checkout",
        }
    }

    /// Name used in the `featureFlags` JSON object.
    pub fn json_name(&self) -> &'static str {
        match self {
            FeatureFlag::BetaFeatures => "betaFeatures",
            FeatureFlag::NewDashboard => "newDashboard",
            FeatureFlag::AdvancedReports => "advancedReports",
            FeatureFlag::EnableRegistration => "enableRegistration",
            FeatureFlag::EnableGuestCheckout => "enableGuestCheckout",
        }
    }
}

impl FromStr for FeatureFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureFlag::ALL
            .into_iter()
            .find(|f| f.json_name() == s || f.setting_key() == s)
            .ok_or_else(|| format!("Unknown feature flag: {}", s))
    }
}

impl std::fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.json_name())
    }
}

impl FeatureFlagSet {
    /// Build the flag set from decoded settings. Missing or non-boolean rows are off.
    pub fn from_settings(settings: &SettingsMap) -> Self {
        let flag = |f: FeatureFlag| {
            settings
                .get(f.setting_key())
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        };
        Self {
            beta_features: flag(FeatureFlag::BetaFeatures),
            new_dashboard: flag(FeatureFlag::NewDashboard),
            advanced_reports: flag(FeatureFlag::AdvancedReports),
            enable_registration: flag(FeatureFlag::EnableRegistration),
            enable_guest_checkout: flag(FeatureFlag::EnableGuestCheckout),
        }
    }

    pub fn is_enabled(&self, flag: FeatureFlag) -> bool {
        match flag {
            FeatureFlag::BetaFeatures => self.beta_features,
            FeatureFlag::NewDashboard => self.new_dashboard,
            FeatureFlag::AdvancedReports => self.advanced_reports,
            FeatureFlag::EnableRegistration => self.enable_registration,
            FeatureFlag::EnableGuestCheckout => self.enable_guest_checkout,
        }
    }
}
