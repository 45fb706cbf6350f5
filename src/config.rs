//! Analysis configuration
//!
//! Everything a caller chooses for a computation is carried in one explicit
//! value: thresholds, category mode, display unit, RoC interval and insulin
//! duration. Nothing here has a default threshold set; callers supply it.

use crate::error::ComputeError;
use crate::roc::RocInterval;
use crate::types::{GlucoseThresholds, GlucoseUnit, RangeCategoryMode};
use serde::{Deserialize, Serialize};

/// Caller-supplied settings for a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Range thresholds in mmol/L
    pub thresholds: GlucoseThresholds,
    pub category_mode: RangeCategoryMode,
    #[serde(default)]
    pub display_unit: GlucoseUnit,
    #[serde(default)]
    pub roc_interval: RocInterval,
    /// Duration of insulin action (hours)
    pub insulin_duration_hours: f64,
}

impl AnalysisConfig {
    pub fn new(
        thresholds: GlucoseThresholds,
        category_mode: RangeCategoryMode,
        insulin_duration_hours: f64,
    ) -> Self {
        Self {
            thresholds,
            category_mode,
            display_unit: GlucoseUnit::default(),
            roc_interval: RocInterval::default(),
            insulin_duration_hours,
        }
    }

    pub fn with_display_unit(mut self, unit: GlucoseUnit) -> Self {
        self.display_unit = unit;
        self
    }

    pub fn with_roc_interval(mut self, interval: RocInterval) -> Self {
        self.roc_interval = interval;
        self
    }

    /// Reject settings that would make the analytics meaningless.
    ///
    /// The analytics never call this themselves; it is for the layer that
    /// accepts user input.
    pub fn validate(&self) -> Result<(), ComputeError> {
        let t = &self.thresholds;
        let values = [t.very_low, t.low, t.high, t.very_high];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ComputeError::InvalidConfig(
                "thresholds must be finite and non-negative".to_string(),
            ));
        }
        if !t.is_ascending() {
            return Err(ComputeError::InvalidConfig(format!(
                "thresholds must ascend: very_low {} < low {} < high {} < very_high {}",
                t.very_low, t.low, t.high, t.very_high
            )));
        }
        if !self.insulin_duration_hours.is_finite() || self.insulin_duration_hours <= 0.0 {
            return Err(ComputeError::InvalidConfig(format!(
                "insulin duration must be positive, got {}",
                self.insulin_duration_hours
            )));
        }
        Ok(())
    }

    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> AnalysisConfig {
        AnalysisConfig::new(
            GlucoseThresholds::new(3.0, 3.9, 10.0, 13.9),
            RangeCategoryMode::Five,
            4.0,
        )
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let mut bad = config();
        bad.thresholds.low = 11.0;
        let err = bad.validate().unwrap_err();
        assert!(matches!(err, ComputeError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let mut bad = config();
        bad.insulin_duration_hours = 0.0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip_and_defaults() {
        let json = r#"{
            "thresholds": {"very_low": 3.0, "low": 3.9, "high": 10.0, "very_high": 13.9},
            "category_mode": "3",
            "roc_interval": 60,
            "insulin_duration_hours": 3.5
        }"#;
        let loaded = AnalysisConfig::from_json(json).unwrap();
        assert_eq!(loaded.category_mode, RangeCategoryMode::Three);
        assert_eq!(loaded.roc_interval, RocInterval::Sixty);
        assert_eq!(loaded.display_unit, GlucoseUnit::MmolL);

        let saved = config().with_display_unit(GlucoseUnit::MgDl).to_json().unwrap();
        assert!(saved.contains("mg/dL"));
        assert_eq!(
            AnalysisConfig::from_json(&saved).unwrap(),
            config().with_display_unit(GlucoseUnit::MgDl)
        );
    }

    #[test]
    fn test_missing_thresholds_is_an_error() {
        let json = r#"{"category_mode": "5", "insulin_duration_hours": 4.0}"#;
        assert!(AnalysisConfig::from_json(json).is_err());
    }
}
