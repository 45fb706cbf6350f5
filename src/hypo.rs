//! Hypoglycemia episode detection
//!
//! Scans a day's sorted readings once, opening an episode at the first value
//! below the low threshold and closing it at the next reading back at or
//! above it. An episode still open at the end of the data closes at the last
//! reading; nothing is extrapolated.

use crate::normalizer::ReadingNormalizer;
use crate::types::{GlucoseReading, GlucoseThresholds, HypoPeriod, HypoStats, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Episode summary for one local calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyHypoStats {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub stats: HypoStats,
}

/// Detector for below-range episodes
pub struct HypoDetector;

impl HypoDetector {
    /// Find every episode in one day's sorted readings and summarize them
    pub fn detect(readings: &[GlucoseReading], thresholds: &GlucoseThresholds) -> HypoStats {
        let periods = find_periods(readings, thresholds);
        summarize(periods)
    }

    /// Split readings of any span into local days and detect per day.
    ///
    /// An episode spanning midnight is reported in both days.
    pub fn detect_by_day(
        readings: &[GlucoseReading],
        thresholds: &GlucoseThresholds,
    ) -> Vec<DailyHypoStats> {
        let sorted = ReadingNormalizer::normalize(readings);
        ReadingNormalizer::split_by_date(&sorted)
            .into_iter()
            .map(|(date, day_readings)| DailyHypoStats {
                date,
                stats: Self::detect(&day_readings, thresholds),
            })
            .collect()
    }
}

/// Episode being accumulated during the scan
struct OpenRun {
    start: Timestamp,
    nadir: f64,
    nadir_time: Timestamp,
}

impl OpenRun {
    fn close(self, end: Timestamp, thresholds: &GlucoseThresholds) -> HypoPeriod {
        HypoPeriod {
            start: self.start,
            end,
            nadir: self.nadir,
            nadir_time: self.nadir_time,
            duration_minutes: (end - self.start).num_seconds() as f64 / 60.0,
            is_severe: self.nadir < thresholds.very_low,
        }
    }
}

fn find_periods(readings: &[GlucoseReading], thresholds: &GlucoseThresholds) -> Vec<HypoPeriod> {
    let mut periods = Vec::new();
    let mut open: Option<OpenRun> = None;

    for reading in readings {
        let below = reading.value < thresholds.low;
        match (open.as_mut(), below) {
            (None, true) => {
                open = Some(OpenRun {
                    start: reading.timestamp,
                    nadir: reading.value,
                    nadir_time: reading.timestamp,
                });
            }
            (Some(run), true) => {
                // strict comparison keeps the first occurrence of the minimum
                if reading.value < run.nadir {
                    run.nadir = reading.value;
                    run.nadir_time = reading.timestamp;
                }
            }
            (Some(_), false) => {
                if let Some(run) = open.take() {
                    periods.push(run.close(reading.timestamp, thresholds));
                }
            }
            (None, false) => {}
        }
    }

    if let (Some(run), Some(last)) = (open.take(), readings.last()) {
        periods.push(run.close(last.timestamp, thresholds));
    }

    periods
}

fn summarize(periods: Vec<HypoPeriod>) -> HypoStats {
    let severe_count = periods.iter().filter(|p| p.is_severe).count() as u32;
    let non_severe_count = periods.len() as u32 - severe_count;
    let lowest_value = periods.iter().map(|p| p.nadir).reduce(f64::min);
    let longest_duration_minutes = periods
        .iter()
        .map(|p| p.duration_minutes)
        .fold(0.0, f64::max);
    let total_duration_minutes = periods.iter().map(|p| p.duration_minutes).sum();

    HypoStats {
        severe_count,
        non_severe_count,
        lowest_value,
        longest_duration_minutes,
        total_duration_minutes,
        hypo_periods: periods,
    }
}
