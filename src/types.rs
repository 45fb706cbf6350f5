//! Core types for the CGM Flux analytics engine
//!
//! This module defines the value objects that flow into and out of every
//! component: glucose readings, thresholds, category counts, AGP slots,
//! rate-of-change points, hypoglycemia episodes and insulin-on-board rows.
//! Glucose values are always held in the canonical unit (mmol/L).

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// An absolute instant carrying the wall-clock offset it was recorded in.
///
/// Ordering and elapsed time use the instant; time-of-day, calendar date and
/// weekday use the local wall-clock reading.
pub type Timestamp = DateTime<FixedOffset>;

/// mg/dL per mmol/L
pub const MGDL_PER_MMOL: f64 = 18.0182;

/// Origin of a glucose value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlucoseSource {
    /// Continuous glucose monitor sensor reading
    Cgm,
    /// Fingerstick blood glucose meter reading
    Bg,
}

impl GlucoseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseSource::Cgm => "cgm",
            GlucoseSource::Bg => "bg",
        }
    }
}

/// A single timestamped glucose value in mmol/L
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub timestamp: Timestamp,
    /// Glucose value (mmol/L)
    pub value: f64,
    pub source: GlucoseSource,
}

impl GlucoseReading {
    pub fn new(timestamp: Timestamp, value: f64, source: GlucoseSource) -> Self {
        Self {
            timestamp,
            value,
            source,
        }
    }

    /// Convenience constructor for a CGM sensor reading
    pub fn cgm(timestamp: Timestamp, value: f64) -> Self {
        Self::new(timestamp, value, GlucoseSource::Cgm)
    }
}

/// Display unit selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    #[serde(rename = "mmol/L")]
    #[default]
    MmolL,
    #[serde(rename = "mg/dL")]
    MgDl,
}

impl GlucoseUnit {
    /// Convert a canonical (mmol/L) value into this unit
    pub fn from_canonical(self, mmol: f64) -> f64 {
        match self {
            GlucoseUnit::MmolL => mmol,
            GlucoseUnit::MgDl => mmol * MGDL_PER_MMOL,
        }
    }

    /// Convert a value expressed in this unit into mmol/L
    pub fn to_canonical(self, value: f64) -> f64 {
        match self {
            GlucoseUnit::MmolL => value,
            GlucoseUnit::MgDl => value / MGDL_PER_MMOL,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnit::MmolL => "mmol/L",
            GlucoseUnit::MgDl => "mg/dL",
        }
    }

    /// Format a canonical value for display with unit suffix
    pub fn format(self, mmol: f64) -> String {
        match self {
            GlucoseUnit::MmolL => format!("{:.1} mmol/L", mmol),
            GlucoseUnit::MgDl => format!("{:.0} mg/dL", self.from_canonical(mmol)),
        }
    }
}

/// Glucose range boundaries in mmol/L.
///
/// Expected ordering is `very_low < low < high < very_high`; the analytics do
/// not check it (see [`crate::config::AnalysisConfig::validate`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseThresholds {
    pub very_low: f64,
    pub low: f64,
    pub high: f64,
    pub very_high: f64,
}

impl GlucoseThresholds {
    pub fn new(very_low: f64, low: f64, high: f64, very_high: f64) -> Self {
        Self {
            very_low,
            low,
            high,
            very_high,
        }
    }

    /// Whether the thresholds are strictly ascending
    pub fn is_ascending(&self) -> bool {
        self.very_low < self.low && self.low < self.high && self.high < self.very_high
    }
}

/// Whether very-low and very-high bands are reported separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeCategoryMode {
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "5")]
    Five,
}

/// Glucose range band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeCategory {
    VeryLow,
    Low,
    InRange,
    High,
    VeryHigh,
}

impl RangeCategory {
    pub const ALL: [RangeCategory; 5] = [
        RangeCategory::VeryLow,
        RangeCategory::Low,
        RangeCategory::InRange,
        RangeCategory::High,
        RangeCategory::VeryHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeCategory::VeryLow => "very_low",
            RangeCategory::Low => "low",
            RangeCategory::InRange => "in_range",
            RangeCategory::High => "high",
            RangeCategory::VeryHigh => "very_high",
        }
    }

    fn index(self) -> usize {
        match self {
            RangeCategory::VeryLow => 0,
            RangeCategory::Low => 1,
            RangeCategory::InRange => 2,
            RangeCategory::High => 3,
            RangeCategory::VeryHigh => 4,
        }
    }
}

/// Per-band reading counts.
///
/// Three-band stats fold very-low into `low` and very-high into `high`.
/// `total()` is always the sum of the counts. Serialized as a flat record
/// `{very_low?, low, in_range, high, very_high?, total}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "CategoryStatsRecord", try_from = "CategoryStatsRecord")]
pub enum CategoryStats {
    Three {
        low: u32,
        in_range: u32,
        high: u32,
    },
    Five {
        very_low: u32,
        low: u32,
        in_range: u32,
        high: u32,
        very_high: u32,
    },
}

impl CategoryStats {
    /// All-zero stats for the given mode
    pub fn empty(mode: RangeCategoryMode) -> Self {
        Self::from_counts(mode, [0; 5])
    }

    /// Build stats from `[very_low, low, in_range, high, very_high]` counts
    pub fn from_counts(mode: RangeCategoryMode, counts: [u32; 5]) -> Self {
        let [very_low, low, in_range, high, very_high] = counts;
        match mode {
            RangeCategoryMode::Three => CategoryStats::Three {
                low: very_low + low,
                in_range,
                high: high + very_high,
            },
            RangeCategoryMode::Five => CategoryStats::Five {
                very_low,
                low,
                in_range,
                high,
                very_high,
            },
        }
    }

    pub fn mode(&self) -> RangeCategoryMode {
        match self {
            CategoryStats::Three { .. } => RangeCategoryMode::Three,
            CategoryStats::Five { .. } => RangeCategoryMode::Five,
        }
    }

    /// Counts as `[very_low, low, in_range, high, very_high]`
    pub fn counts(&self) -> [u32; 5] {
        match *self {
            CategoryStats::Three {
                low,
                in_range,
                high,
            } => [0, low, in_range, high, 0],
            CategoryStats::Five {
                very_low,
                low,
                in_range,
                high,
                very_high,
            } => [very_low, low, in_range, high, very_high],
        }
    }

    /// Count one reading in `category`
    pub fn record(&mut self, category: RangeCategory) {
        let mut counts = self.counts();
        counts[category.index()] += 1;
        *self = Self::from_counts(self.mode(), counts);
    }

    /// Count for a band; bands absent in three-band mode report 0
    pub fn count(&self, category: RangeCategory) -> u32 {
        self.counts()[category.index()]
    }

    pub fn total(&self) -> u32 {
        self.counts().iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Unrounded share of readings in `category` (0-100)
    pub fn percentage_exact(&self, category: RangeCategory) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(category) as f64 / total as f64 * 100.0
    }

    /// Rounded share of readings in `category` (0-100), 0 when empty
    pub fn percentage(&self, category: RangeCategory) -> u32 {
        self.percentage_exact(category).round() as u32
    }

    /// Sum two stats; the result keeps the mode of `self`
    pub fn merge(&self, other: &CategoryStats) -> CategoryStats {
        let a = self.counts();
        let b = other.counts();
        let mut sum = [0u32; 5];
        for i in 0..5 {
            sum[i] = a[i] + b[i];
        }
        Self::from_counts(self.mode(), sum)
    }
}

/// Flat serialized shape of [`CategoryStats`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryStatsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    very_low: Option<u32>,
    low: u32,
    in_range: u32,
    high: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    very_high: Option<u32>,
    total: u32,
}

impl From<CategoryStats> for CategoryStatsRecord {
    fn from(stats: CategoryStats) -> Self {
        let total = stats.total();
        match stats {
            CategoryStats::Three {
                low,
                in_range,
                high,
            } => CategoryStatsRecord {
                very_low: None,
                low,
                in_range,
                high,
                very_high: None,
                total,
            },
            CategoryStats::Five {
                very_low,
                low,
                in_range,
                high,
                very_high,
            } => CategoryStatsRecord {
                very_low: Some(very_low),
                low,
                in_range,
                high,
                very_high: Some(very_high),
                total,
            },
        }
    }
}

impl TryFrom<CategoryStatsRecord> for CategoryStats {
    type Error = String;

    fn try_from(record: CategoryStatsRecord) -> Result<Self, Self::Error> {
        let stats = match (record.very_low, record.very_high) {
            (Some(very_low), Some(very_high)) => CategoryStats::Five {
                very_low,
                low: record.low,
                in_range: record.in_range,
                high: record.high,
                very_high,
            },
            (None, None) => CategoryStats::Three {
                low: record.low,
                in_range: record.in_range,
                high: record.high,
            },
            _ => return Err("very_low and very_high must be both present or both absent".into()),
        };
        if stats.total() != record.total {
            return Err(format!(
                "total {} does not match category sum {}",
                record.total,
                stats.total()
            ));
        }
        Ok(stats)
    }
}

/// Percentile summary for one five-minute time-of-day slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgpTimeSlotStats {
    /// Slot start as "HH:MM"
    pub time_slot: String,
    pub lowest: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub highest: f64,
    pub count: u32,
}

/// Overall glucose summary shown alongside an AGP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlycemicSummary {
    pub count: u32,
    /// Mean glucose (mmol/L)
    pub mean: f64,
    /// Population standard deviation (mmol/L)
    pub sd: f64,
    /// Coefficient of variation (%)
    pub cv_percent: f64,
    /// Glucose Management Indicator (%)
    pub gmi_percent: f64,
}

/// Speed-of-change classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RocCategory {
    Good,
    Medium,
    Bad,
}

/// Rate of change at one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocDataPoint {
    pub timestamp: Timestamp,
    /// Local time of day in hours, [0, 24)
    pub time_decimal: f64,
    /// Smoothed magnitude of change (mmol/L per 5 min)
    pub roc: f64,
    /// Signed, unsmoothed change (mmol/L per 5 min)
    pub raw_roc: f64,
    pub glucose_value: f64,
    pub category: RocCategory,
}

/// Summary of a rate-of-change series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocStats {
    pub total_points: u32,
    pub good_count: u32,
    pub medium_count: u32,
    pub bad_count: u32,
    pub good_percentage: f64,
    pub medium_percentage: f64,
    pub bad_percentage: f64,
    /// Largest smoothed magnitude (mmol/L per 5 min)
    pub max_roc: f64,
    /// Population standard deviation of smoothed magnitudes
    pub sd_roc: f64,
    /// Longest contiguous run of good points (minutes)
    pub longest_stable_minutes: f64,
}

/// One contiguous below-low episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypoPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Lowest value in the episode (mmol/L)
    pub nadir: f64,
    pub nadir_time: Timestamp,
    pub duration_minutes: f64,
    pub is_severe: bool,
}

/// Hypoglycemia summary for a day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypoStats {
    pub severe_count: u32,
    pub non_severe_count: u32,
    pub lowest_value: Option<f64>,
    pub longest_duration_minutes: f64,
    pub total_duration_minutes: f64,
    pub hypo_periods: Vec<HypoPeriod>,
}

/// Basal rate set at a point in time; in effect until the next change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasalRateChange {
    pub timestamp: Timestamp,
    pub units_per_hour: f64,
}

/// A discrete bolus delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BolusDose {
    pub timestamp: Timestamp,
    pub units: f64,
}

/// Insulin dosing history exported from a pump
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsulinHistory {
    #[serde(default)]
    pub basal_changes: Vec<BasalRateChange>,
    #[serde(default)]
    pub boluses: Vec<BolusDose>,
}

/// Insulin delivery and activity at the top of one hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyIobData {
    /// Hour of day, 0-23
    pub hour: u32,
    /// Basal units delivered during the preceding hour
    pub basal_in_previous_hour: f64,
    /// Bolus units delivered during the preceding hour
    pub bolus_in_previous_hour: f64,
    /// Bolus insulin still active at the top of the hour
    pub active_iob: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_three_band_folds_extremes() {
        let mut stats = CategoryStats::empty(RangeCategoryMode::Three);
        stats.record(RangeCategory::VeryLow);
        stats.record(RangeCategory::Low);
        stats.record(RangeCategory::VeryHigh);

        assert_eq!(
            stats,
            CategoryStats::Three {
                low: 2,
                in_range: 0,
                high: 1
            }
        );
        assert_eq!(stats.count(RangeCategory::VeryLow), 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_percentage_rounding() {
        let stats = CategoryStats::from_counts(RangeCategoryMode::Five, [0, 1, 2, 0, 0]);
        assert_eq!(stats.percentage(RangeCategory::Low), 33);
        assert_eq!(stats.percentage(RangeCategory::InRange), 67);
        assert_eq!(
            CategoryStats::empty(RangeCategoryMode::Five).percentage(RangeCategory::Low),
            0
        );
    }

    #[test]
    fn test_serialized_shape() {
        let five = CategoryStats::from_counts(RangeCategoryMode::Five, [1, 2, 3, 4, 5]);
        let json = serde_json::to_value(five).unwrap();
        assert_eq!(json["very_low"], 1);
        assert_eq!(json["total"], 15);

        let three = CategoryStats::from_counts(RangeCategoryMode::Three, [1, 2, 3, 4, 5]);
        let json = serde_json::to_value(three).unwrap();
        assert!(json.get("very_low").is_none());
        assert_eq!(json["low"], 3);
        assert_eq!(json["total"], 15);

        let back: CategoryStats = serde_json::from_value(json).unwrap();
        assert_eq!(back, three);
    }

    #[test]
    fn test_deserialize_rejects_bad_total() {
        let json = r#"{"low": 1, "in_range": 1, "high": 1, "total": 5}"#;
        assert!(serde_json::from_str::<CategoryStats>(json).is_err());
    }

    #[test]
    fn test_unit_conversion() {
        assert!((GlucoseUnit::MgDl.from_canonical(5.5) - 99.1001).abs() < 1e-9);
        assert!((GlucoseUnit::MgDl.to_canonical(180.182) - 10.0).abs() < 1e-9);
        assert_eq!(GlucoseUnit::MmolL.from_canonical(5.5), 5.5);
        assert_eq!(GlucoseUnit::MgDl.format(10.0), "180 mg/dL");
    }

    #[test]
    fn test_threshold_ordering() {
        assert!(GlucoseThresholds::new(3.0, 3.9, 10.0, 13.9).is_ascending());
        assert!(!GlucoseThresholds::new(3.9, 3.0, 10.0, 13.9).is_ascending());
    }
}
