use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::models::UserSettings;

/// Tunable thresholds for cycle inference. Every field falls back to its
/// default when missing from a serialized config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// A log this many days after a cycle start still belongs to its period.
    pub period_attribution_window_days: i64,
    /// A log further than this from the latest start opens a new cycle.
    pub minimum_inter_cycle_gap_days: i64,
    /// A new cycle only becomes active when it starts this close to today.
    pub active_window_days: i64,
    pub luteal_phase_days: i64,
    /// Fertile days before the ovulation date.
    pub fertile_window_lead_days: i64,
    /// Completed cycles considered for the average and regularity.
    pub stats_window: usize,
    pub regularity_threshold: f64,
    /// Length of the predicted bleeding window drawn on the calendar.
    pub predicted_period_days: i64,
    pub default_cycle_length: i64,
    pub default_period_length: i64,
    pub short_cycle_days: i64,
    pub long_cycle_days: i64,
    pub late_period_grace_days: i64,
    /// Flow days further apart than this split a period in two.
    pub period_gap_tolerance_days: i64,
    #[serde(with = "weekday_name")]
    pub week_starts_on: Weekday,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            period_attribution_window_days: 7,
            minimum_inter_cycle_gap_days: 18,
            active_window_days: 7,
            luteal_phase_days: 14,
            fertile_window_lead_days: 5,
            stats_window: 6,
            regularity_threshold: 0.7,
            predicted_period_days: 5,
            default_cycle_length: 28,
            default_period_length: 5,
            short_cycle_days: 21,
            long_cycle_days: 35,
            late_period_grace_days: 3,
            period_gap_tolerance_days: 2,
            week_starts_on: Weekday::Sun,
        }
    }
}

impl CoreConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Same thresholds, but insufficient-data fallbacks come from the user's
    /// own onboarding answers instead of the population defaults.
    pub fn with_user_defaults(&self, settings: &UserSettings) -> Self {
        let mut config = self.clone();
        if settings.average_cycle_length > 0 {
            config.default_cycle_length = settings.average_cycle_length;
        }
        if settings.average_period_length > 0 {
            config.default_period_length = settings.average_period_length;
        }
        config
    }
}

mod weekday_name {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&day.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<Weekday>()
            .map_err(|_| serde::de::Error::custom(format!("unknown weekday `{raw}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            CoreConfig::from_json(r#"{"minimum_inter_cycle_gap_days": 20, "week_starts_on": "Mon"}"#)
                .unwrap();
        assert_eq!(config.minimum_inter_cycle_gap_days, 20);
        assert_eq!(config.period_attribution_window_days, 7);
        assert_eq!(config.week_starts_on, Weekday::Mon);
    }

    #[test]
    fn rejects_unknown_weekday() {
        assert!(CoreConfig::from_json(r#"{"week_starts_on": "Someday"}"#).is_err());
    }

    #[test]
    fn user_defaults_override_fallbacks() {
        let settings = UserSettings {
            average_cycle_length: 31,
            average_period_length: 0,
            ..UserSettings::default()
        };
        let config = CoreConfig::default().with_user_defaults(&settings);
        assert_eq!(config.default_cycle_length, 31);
        assert_eq!(config.default_period_length, 5);
    }
}
