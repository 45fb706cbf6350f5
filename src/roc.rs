//! Rate-of-change analysis
//!
//! Computes how fast glucose moves, expressed as mmol/L per 5 minutes:
//! - Consecutive mode compares each reading with the one before it
//! - Interval mode compares against the latest reading at least N minutes older
//!
//! Magnitudes are smoothed with a 3-point centered moving average and then
//! classified against fixed speed thresholds.

use crate::stats::{centered_moving_average, population_std_dev};
use crate::types::{GlucoseReading, GlucoseUnit, RocCategory, RocDataPoint, RocStats, Timestamp, MGDL_PER_MMOL};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Below this smoothed magnitude a point is stable (1 mg/dL per minute)
pub const ROC_GOOD_THRESHOLD: f64 = 5.0 / MGDL_PER_MMOL;

/// At or above this smoothed magnitude a point is rapid (2 mg/dL per minute)
pub const ROC_BAD_THRESHOLD: f64 = 10.0 / MGDL_PER_MMOL;

/// Moving-average window applied to magnitudes
pub const SMOOTHING_WINDOW: usize = 3;

/// Comparison interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RocInterval {
    /// Consecutive readings
    #[default]
    Fifteen,
    Thirty,
    Sixty,
    OneTwenty,
}

impl RocInterval {
    pub fn minutes(self) -> u32 {
        match self {
            RocInterval::Fifteen => 15,
            RocInterval::Thirty => 30,
            RocInterval::Sixty => 60,
            RocInterval::OneTwenty => 120,
        }
    }
}

impl TryFrom<u32> for RocInterval {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            15 => Ok(RocInterval::Fifteen),
            30 => Ok(RocInterval::Thirty),
            60 => Ok(RocInterval::Sixty),
            120 => Ok(RocInterval::OneTwenty),
            other => Err(format!("unsupported RoC interval: {other} (expected 15, 30, 60 or 120)")),
        }
    }
}

impl From<RocInterval> for u32 {
    fn from(interval: RocInterval) -> Self {
        interval.minutes()
    }
}

/// Classification thresholds expressed in a display unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocThresholds {
    pub good: f64,
    pub bad: f64,
    pub unit: GlucoseUnit,
}

impl RocThresholds {
    pub fn for_unit(unit: GlucoseUnit) -> Self {
        Self {
            good: unit.from_canonical(ROC_GOOD_THRESHOLD),
            bad: unit.from_canonical(ROC_BAD_THRESHOLD),
            unit,
        }
    }
}

/// Classify a smoothed magnitude (mmol/L per 5 min)
pub fn classify_roc(roc: f64) -> RocCategory {
    let magnitude = roc.abs();
    if magnitude < ROC_GOOD_THRESHOLD {
        RocCategory::Good
    } else if magnitude >= ROC_BAD_THRESHOLD {
        RocCategory::Bad
    } else {
        RocCategory::Medium
    }
}

/// Rate-of-change engine
pub struct RocEngine;

impl RocEngine {
    /// Compute smoothed, classified points for sorted readings
    pub fn compute(readings: &[GlucoseReading], interval: RocInterval) -> Vec<RocDataPoint> {
        let raw = match interval {
            RocInterval::Fifteen => consecutive_deltas(readings),
            _ => interval_deltas(readings, interval.minutes() as f64),
        };

        let magnitudes: Vec<f64> = raw.iter().map(|(_, roc)| roc.abs()).collect();
        let smoothed = centered_moving_average(&magnitudes, SMOOTHING_WINDOW);

        raw.into_iter()
            .zip(smoothed)
            .map(|((reading, raw_roc), roc)| RocDataPoint {
                timestamp: reading.timestamp,
                time_decimal: time_decimal(&reading.timestamp),
                roc,
                raw_roc,
                glucose_value: reading.value,
                category: classify_roc(roc),
            })
            .collect()
    }

    /// Summarize a point series
    pub fn stats(points: &[RocDataPoint]) -> RocStats {
        if points.is_empty() {
            return RocStats::default();
        }

        let count = |category: RocCategory| points.iter().filter(|p| p.category == category).count() as u32;
        let total = points.len() as u32;
        let good_count = count(RocCategory::Good);
        let medium_count = count(RocCategory::Medium);
        let bad_count = count(RocCategory::Bad);
        let pct = |n: u32| n as f64 / total as f64 * 100.0;

        let magnitudes: Vec<f64> = points.iter().map(|p| p.roc).collect();
        let max_roc = magnitudes.iter().copied().fold(0.0, f64::max);

        RocStats {
            total_points: total,
            good_count,
            medium_count,
            bad_count,
            good_percentage: pct(good_count),
            medium_percentage: pct(medium_count),
            bad_percentage: pct(bad_count),
            max_roc,
            sd_roc: population_std_dev(&magnitudes),
            longest_stable_minutes: longest_stable_minutes(points),
        }
    }
}

/// Longest run of consecutive good points, measured first point to last
pub fn longest_stable_minutes(points: &[RocDataPoint]) -> f64 {
    let mut longest = 0.0f64;
    let mut run_start: Option<&Timestamp> = None;

    for point in points {
        if point.category == RocCategory::Good {
            let start = *run_start.get_or_insert(&point.timestamp);
            longest = longest.max(minutes_between(start, &point.timestamp));
        } else {
            run_start = None;
        }
    }

    longest
}

fn consecutive_deltas(readings: &[GlucoseReading]) -> Vec<(&GlucoseReading, f64)> {
    let mut deltas = Vec::with_capacity(readings.len().saturating_sub(1));
    let mut skipped = 0usize;

    for pair in readings.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        match normalized_delta(prev, curr) {
            Some(roc) => deltas.push((curr, roc)),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "readings sharing a timestamp with their predecessor");
    }
    deltas
}

fn interval_deltas(readings: &[GlucoseReading], interval_minutes: f64) -> Vec<(&GlucoseReading, f64)> {
    let mut deltas = Vec::new();
    // Index one past the latest reading that is old enough for the current one
    let mut eligible_end = 0usize;

    for (i, curr) in readings.iter().enumerate() {
        while eligible_end < i
            && minutes_between(&readings[eligible_end].timestamp, &curr.timestamp) >= interval_minutes
        {
            eligible_end += 1;
        }
        if eligible_end == 0 {
            continue;
        }
        if let Some(roc) = normalized_delta(&readings[eligible_end - 1], curr) {
            deltas.push((curr, roc));
        }
    }

    deltas
}

/// Change between two readings scaled to a 5-minute step
fn normalized_delta(prev: &GlucoseReading, curr: &GlucoseReading) -> Option<f64> {
    let elapsed = minutes_between(&prev.timestamp, &curr.timestamp);
    if elapsed <= 0.0 {
        return None;
    }
    Some((curr.value - prev.value) / elapsed * 5.0)
}

fn minutes_between(start: &Timestamp, end: &Timestamp) -> f64 {
    (*end - *start).num_seconds() as f64 / 60.0
}

fn time_decimal(ts: &Timestamp) -> f64 {
    ts.hour() as f64 + ts.minute() as f64 / 60.0 + ts.second() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn series(step_minutes: i64, values: &[f64]) -> Vec<GlucoseReading> {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| GlucoseReading::cgm(start + Duration::minutes(step_minutes * i as i64), *v))
            .collect()
    }

    #[test]
    fn test_constant_series_is_all_good() {
        let readings = series(15, &[6.0; 20]);
        for interval in [
            RocInterval::Fifteen,
            RocInterval::Thirty,
            RocInterval::Sixty,
            RocInterval::OneTwenty,
        ] {
            let points = RocEngine::compute(&readings, interval);
            assert!(!points.is_empty());
            assert!(points.iter().all(|p| p.roc == 0.0 && p.category == RocCategory::Good));

            let stats = RocEngine::stats(&points);
            assert_eq!(stats.good_percentage, 100.0);
            assert_eq!(stats.max_roc, 0.0);
            assert_eq!(stats.sd_roc, 0.0);
        }
    }

    #[test]
    fn test_consecutive_mode() {
        // +1.5 mmol/L per 15 minutes = 0.5 per 5 minutes
        let readings = series(15, &[5.0, 6.5, 8.0]);
        let points = RocEngine::compute(&readings, RocInterval::Fifteen);
        assert_eq!(points.len(), 2);
        assert!((points[0].raw_roc - 0.5).abs() < 1e-12);
        assert!((points[0].roc - 0.5).abs() < 1e-12);
        assert_eq!(points[0].glucose_value, 6.5);
        assert!((points[0].time_decimal - 0.25).abs() < 1e-12);
        assert_eq!(points[0].category, RocCategory::Medium);
    }

    #[test]
    fn test_falling_values_use_magnitude() {
        let readings = series(5, &[10.0, 9.0, 8.0, 7.0]);
        let points = RocEngine::compute(&readings, RocInterval::Fifteen);
        assert!(points.iter().all(|p| p.raw_roc < 0.0));
        assert!(points.iter().all(|p| (p.roc - 1.0).abs() < 1e-12));
        assert!(points.iter().all(|p| p.category == RocCategory::Bad));
    }

    #[test]
    fn test_interval_mode_skips_and_uses_nearest_prior() {
        // 5-minute readings, 30-minute interval: first eligible at index 6
        let values: Vec<f64> = (0..10).map(|i| 5.0 + i as f64 * 0.1).collect();
        let readings = series(5, &values);
        let points = RocEngine::compute(&readings, RocInterval::Thirty);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].timestamp, readings[6].timestamp);
        // 0.6 over 30 minutes = 0.1 per 5 minutes
        assert!((points[0].raw_roc - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_interval_mode_irregular_gaps() {
        // Readings at 0, 20, 50 minutes; 30-minute interval
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
            .unwrap();
        let readings = vec![
            GlucoseReading::cgm(start, 5.0),
            GlucoseReading::cgm(start + Duration::minutes(20), 6.0),
            GlucoseReading::cgm(start + Duration::minutes(50), 8.0),
        ];
        let points = RocEngine::compute(&readings, RocInterval::Thirty);
        // Only the 50-minute reading has a predecessor 30+ minutes older (the 20-minute one)
        assert_eq!(points.len(), 1);
        assert!((points[0].raw_roc - (2.0 / 30.0 * 5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_smoothing_averages_neighbours() {
        let readings = series(5, &[5.0, 5.0, 6.0, 6.0, 6.0]);
        let points = RocEngine::compute(&readings, RocInterval::Fifteen);
        let raw: Vec<f64> = points.iter().map(|p| p.raw_roc.abs()).collect();
        assert_eq!(raw, vec![0.0, 1.0, 0.0, 0.0]);
        assert!((points[0].roc - 0.5).abs() < 1e-12);
        assert!((points[1].roc - 1.0 / 3.0).abs() < 1e-12);
        assert!((points[3].roc - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_timestamps_are_skipped() {
        let mut readings = series(5, &[5.0, 6.0]);
        readings.insert(1, readings[0].clone());
        let points = RocEngine::compute(&readings, RocInterval::Fifteen);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_longest_stable_period() {
        let values = [5.0, 5.0, 5.0, 5.0, 15.0, 15.0, 15.0, 15.0, 15.0, 15.0, 15.0];
        let readings = series(15, &values);
        let points = RocEngine::compute(&readings, RocInterval::Fifteen);
        let stats = RocEngine::stats(&points);
        assert_eq!(stats.bad_count, 3);
        // Stable tail runs from 01:30 to 02:30
        assert_eq!(stats.longest_stable_minutes, 60.0);
        assert_eq!(
            stats.good_count + stats.medium_count + stats.bad_count,
            stats.total_points
        );
    }

    #[test]
    fn test_empty_and_single() {
        assert!(RocEngine::compute(&[], RocInterval::Fifteen).is_empty());
        let one = series(5, &[5.0]);
        assert!(RocEngine::compute(&one, RocInterval::Sixty).is_empty());
        assert_eq!(RocEngine::stats(&[]), RocStats::default());
    }

    #[test]
    fn test_interval_serde() {
        let interval: RocInterval = serde_json::from_str("60").unwrap();
        assert_eq!(interval, RocInterval::Sixty);
        assert!(serde_json::from_str::<RocInterval>("45").is_err());
        assert_eq!(serde_json::to_string(&RocInterval::OneTwenty).unwrap(), "120");
    }

    #[test]
    fn test_thresholds_for_unit() {
        let mgdl = RocThresholds::for_unit(GlucoseUnit::MgDl);
        assert!((mgdl.good - 5.0).abs() < 1e-9);
        assert!((mgdl.bad - 10.0).abs() < 1e-9);
    }
}
