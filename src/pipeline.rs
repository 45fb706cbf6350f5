//! Report orchestration
//!
//! This module provides the high-level API for CGM Flux. It runs every
//! component over one set of readings and configuration and gathers the
//! results into a single serializable report.

use crate::agp::AgpCalculator;
use crate::categorizer::{self, DayOfWeekStats, PeriodStats, TimePeriod, WeekStats};
use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use crate::hypo::HypoDetector;
use crate::input::ReadingAdapter;
use crate::iob::IobEstimator;
use crate::normalizer::ReadingNormalizer;
use crate::roc::RocEngine;
use crate::types::{
    AgpTimeSlotStats, CategoryStats, GlucoseReading, GlycemicSummary, HourlyIobData, HypoStats,
    InsulinHistory, RocStats, Timestamp,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Category counts with a display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledStats {
    pub label: String,
    pub stats: CategoryStats,
}

/// Weekday counts with the combined views kept apart.
///
/// `days` holds Monday..Sunday and sums to the grand total. `workday` and
/// `weekend` are projections over the same readings and must not be added to
/// the rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayBreakdown {
    pub days: Vec<LabelledStats>,
    pub workday: CategoryStats,
    pub weekend: CategoryStats,
}

impl From<&DayOfWeekStats> for WeekdayBreakdown {
    fn from(stats: &DayOfWeekStats) -> Self {
        Self {
            days: stats
                .rows()
                .into_iter()
                .map(|(label, stats)| LabelledStats { label, stats })
                .collect(),
            workday: stats.workday(),
            weekend: stats.weekend(),
        }
    }
}

/// Per-day results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub time_in_range: CategoryStats,
    pub roc: RocStats,
    pub hypo: HypoStats,
    /// Present when an insulin history was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insulin: Option<Vec<HourlyIobData>>,
}

/// Everything the dashboard renders for one selection of readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReport {
    pub reading_count: u32,
    pub first_reading: Option<Timestamp>,
    pub last_reading: Option<Timestamp>,
    pub summary: GlycemicSummary,
    pub time_in_range: CategoryStats,
    pub by_day_of_week: WeekdayBreakdown,
    pub by_week: Vec<WeekStats>,
    /// 24 entries, hour 0 first
    pub by_hour: Vec<CategoryStats>,
    pub by_period: Vec<PeriodStats>,
    /// 288 entries, "00:00" first
    pub agp: Vec<AgpTimeSlotStats>,
    pub days: Vec<DailyReport>,
}

/// Build a full report.
///
/// Readings may arrive in any order; they are normalized first. Per-day
/// sections use each reading's local calendar date.
pub fn build_report(
    readings: &[GlucoseReading],
    insulin: Option<&InsulinHistory>,
    config: &AnalysisConfig,
) -> GlucoseReport {
    let sorted = ReadingNormalizer::normalize(readings);
    let thresholds = &config.thresholds;
    let mode = config.category_mode;
    trace!(readings = sorted.len(), "building glucose report");

    let by_day_of_week =
        WeekdayBreakdown::from(&categorizer::by_day_of_week(&sorted, thresholds, mode));

    let days = ReadingNormalizer::split_by_date(&sorted)
        .into_iter()
        .map(|(date, day_readings)| build_daily(date, &day_readings, insulin, config))
        .collect::<Vec<_>>();
    trace!(days = days.len(), "daily sections computed");

    GlucoseReport {
        reading_count: sorted.len() as u32,
        first_reading: sorted.first().map(|r| r.timestamp),
        last_reading: sorted.last().map(|r| r.timestamp),
        summary: AgpCalculator::glycemic_summary(&sorted),
        time_in_range: categorizer::overall(&sorted, thresholds, mode),
        by_day_of_week,
        by_week: categorizer::by_week(&sorted, thresholds, mode),
        by_hour: categorizer::by_hour(&sorted, thresholds, mode),
        by_period: categorizer::by_time_period(
            &sorted,
            thresholds,
            mode,
            &TimePeriod::standard_periods(),
            None,
        ),
        agp: AgpCalculator::compute(&sorted),
        days,
    }
}

/// Build the section for one local day from its sorted readings
pub fn build_daily(
    date: NaiveDate,
    day_readings: &[GlucoseReading],
    insulin: Option<&InsulinHistory>,
    config: &AnalysisConfig,
) -> DailyReport {
    let roc_points = RocEngine::compute(day_readings, config.roc_interval);
    let insulin = match (insulin, day_readings.first()) {
        (Some(history), Some(first)) => Some(IobEstimator::hourly(
            history,
            date,
            *first.timestamp.offset(),
            config.insulin_duration_hours,
        )),
        _ => None,
    };

    DailyReport {
        date,
        time_in_range: categorizer::overall(day_readings, &config.thresholds, config.category_mode),
        roc: RocEngine::stats(&roc_points),
        hypo: HypoDetector::detect(day_readings, &config.thresholds),
        insulin,
    }
}

/// JSON in, JSON out: readings array, optional insulin history, config object
pub fn report_to_json(
    readings_json: &str,
    insulin_json: Option<&str>,
    config_json: &str,
) -> Result<String, ComputeError> {
    let readings: Vec<GlucoseReading> = ReadingAdapter::parse_array(readings_json)?;
    if let Some(err) = ReadingAdapter::validate_readings(&readings).into_iter().next() {
        return Err(err);
    }
    let insulin = insulin_json
        .map(ReadingAdapter::parse_insulin_history)
        .transpose()?;
    if let Some(err) = insulin
        .iter()
        .flat_map(ReadingAdapter::validate_insulin_history)
        .next()
    {
        return Err(err);
    }
    if config_json.trim().is_empty() {
        return Err(ComputeError::MissingField("config".to_string()));
    }
    let config = AnalysisConfig::from_json(config_json)?;
    config.validate()?;

    let report = build_report(&readings, insulin.as_ref(), &config);
    serde_json::to_string(&report).map_err(ComputeError::JsonError)
}
