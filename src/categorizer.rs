//! Time-in-range categorization
//!
//! Classifies glucose values into three or five bands and accumulates band
//! counts per grouping key: day of week, week, date, hour or named period.
//! A value equal to a threshold belongs to the band above it.

use crate::types::{
    CategoryStats, GlucoseReading, GlucoseThresholds, RangeCategory, RangeCategoryMode, Timestamp,
};
use chrono::{Datelike, Duration, NaiveDate, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Classify a single glucose value (mmol/L)
pub fn classify(value: f64, thresholds: &GlucoseThresholds, mode: RangeCategoryMode) -> RangeCategory {
    let category = if value < thresholds.very_low {
        RangeCategory::VeryLow
    } else if value < thresholds.low {
        RangeCategory::Low
    } else if value < thresholds.high {
        RangeCategory::InRange
    } else if value < thresholds.very_high {
        RangeCategory::High
    } else {
        RangeCategory::VeryHigh
    };

    match (mode, category) {
        (RangeCategoryMode::Three, RangeCategory::VeryLow) => RangeCategory::Low,
        (RangeCategoryMode::Three, RangeCategory::VeryHigh) => RangeCategory::High,
        (_, category) => category,
    }
}

/// Group readings by `key_fn` and count bands per group.
///
/// Readings for which `key_fn` returns `None` are left out of every group.
pub fn aggregate<K, F>(
    readings: &[GlucoseReading],
    thresholds: &GlucoseThresholds,
    mode: RangeCategoryMode,
    key_fn: F,
) -> BTreeMap<K, CategoryStats>
where
    K: Ord,
    F: Fn(&GlucoseReading) -> Option<K>,
{
    let mut groups: BTreeMap<K, CategoryStats> = BTreeMap::new();
    let mut excluded = 0usize;

    for reading in readings {
        match key_fn(reading) {
            Some(key) => groups
                .entry(key)
                .or_insert_with(|| CategoryStats::empty(mode))
                .record(classify(reading.value, thresholds, mode)),
            None => excluded += 1,
        }
    }

    if excluded > 0 {
        debug!(excluded, total = readings.len(), "readings without a grouping key");
    }

    groups
}

/// Band counts over every reading
pub fn overall(
    readings: &[GlucoseReading],
    thresholds: &GlucoseThresholds,
    mode: RangeCategoryMode,
) -> CategoryStats {
    aggregate(readings, thresholds, mode, |_| Some(()))
        .remove(&())
        .unwrap_or_else(|| CategoryStats::empty(mode))
}

/// Band counts per local weekday.
///
/// Only the seven weekdays are stored; the workday and weekend views are
/// computed from them on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekStats {
    /// Monday first
    days: [CategoryStats; 7],
}

impl DayOfWeekStats {
    pub fn get(&self, day: Weekday) -> &CategoryStats {
        &self.days[day.num_days_from_monday() as usize]
    }

    /// Monday through Friday combined
    pub fn workday(&self) -> CategoryStats {
        self.combine(&[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri])
    }

    /// Saturday and Sunday combined
    pub fn weekend(&self) -> CategoryStats {
        self.combine(&[Weekday::Sat, Weekday::Sun])
    }

    /// Sum over the seven weekdays; the workday/weekend views are not added again
    pub fn grand_total(&self) -> CategoryStats {
        self.days[1..]
            .iter()
            .fold(self.days[0], |acc, stats| acc.merge(stats))
    }

    /// Labelled rows for the seven weekdays, Monday first.
    ///
    /// The workday and weekend views are not included; summing these rows
    /// gives the grand total.
    pub fn rows(&self) -> Vec<(String, CategoryStats)> {
        WEEKDAYS
            .iter()
            .map(|day| (weekday_name(*day).to_string(), *self.get(*day)))
            .collect()
    }

    fn combine(&self, days: &[Weekday]) -> CategoryStats {
        days.iter()
            .map(|day| *self.get(*day))
            .fold(CategoryStats::empty(self.days[0].mode()), |acc, stats| {
                acc.merge(&stats)
            })
    }
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Band counts per local weekday
pub fn by_day_of_week(
    readings: &[GlucoseReading],
    thresholds: &GlucoseThresholds,
    mode: RangeCategoryMode,
) -> DayOfWeekStats {
    let groups = aggregate(readings, thresholds, mode, |r| {
        Some(r.timestamp.weekday().num_days_from_monday())
    });
    let mut days = [CategoryStats::empty(mode); 7];
    for (index, stats) in groups {
        days[index as usize] = stats;
    }
    DayOfWeekStats { days }
}

/// Band counts for one Monday-based week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekStats {
    pub week_start: NaiveDate,
    /// e.g. "Jan 6–12" or "Jan 29–Feb 4"
    pub label: String,
    pub stats: CategoryStats,
}

/// Band counts per week, ordered by week start
pub fn by_week(
    readings: &[GlucoseReading],
    thresholds: &GlucoseThresholds,
    mode: RangeCategoryMode,
) -> Vec<WeekStats> {
    aggregate(readings, thresholds, mode, |r| Some(week_start(r.timestamp.date_naive())))
        .into_iter()
        .map(|(start, stats)| WeekStats {
            week_start: start,
            label: week_label(start),
            stats,
        })
        .collect()
}

/// Monday on or before `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Display label for the week starting on `start`
pub fn week_label(start: NaiveDate) -> String {
    let end = start + Duration::days(6);
    if end.month() == start.month() {
        format!("{} {}–{}", start.format("%b"), start.day(), end.day())
    } else {
        format!(
            "{} {}–{} {}",
            start.format("%b"),
            start.day(),
            end.format("%b"),
            end.day()
        )
    }
}

/// Band counts per local calendar date
pub fn by_date(
    readings: &[GlucoseReading],
    thresholds: &GlucoseThresholds,
    mode: RangeCategoryMode,
) -> BTreeMap<NaiveDate, CategoryStats> {
    aggregate(readings, thresholds, mode, |r| Some(r.timestamp.date_naive()))
}

/// Band counts per local hour of day; always 24 entries, hour 0 first
pub fn by_hour(
    readings: &[GlucoseReading],
    thresholds: &GlucoseThresholds,
    mode: RangeCategoryMode,
) -> Vec<CategoryStats> {
    let groups = aggregate(readings, thresholds, mode, |r| Some(r.timestamp.hour()));
    (0..24)
        .map(|hour| {
            groups
                .get(&hour)
                .copied()
                .unwrap_or_else(|| CategoryStats::empty(mode))
        })
        .collect()
}

/// A named part of the day covering hours `[start_hour, end_hour)`.
///
/// When `start_hour > end_hour` the period wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimePeriod {
    pub fn new(name: impl Into<String>, start_hour: u32, end_hour: u32) -> Self {
        Self {
            name: name.into(),
            start_hour,
            end_hour,
        }
    }

    /// Night, Morning, Afternoon and Evening in six-hour blocks
    pub fn standard_periods() -> Vec<TimePeriod> {
        vec![
            TimePeriod::new("Night", 0, 6),
            TimePeriod::new("Morning", 6, 12),
            TimePeriod::new("Afternoon", 12, 18),
            TimePeriod::new("Evening", 18, 24),
        ]
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Band counts for one named period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub name: String,
    pub stats: CategoryStats,
}

/// Band counts per named period, in the order the periods are given.
///
/// Readings at or after `cutoff` are ignored, which lets a partial current day
/// be compared with complete ones. Overlapping periods each count a reading.
pub fn by_time_period(
    readings: &[GlucoseReading],
    thresholds: &GlucoseThresholds,
    mode: RangeCategoryMode,
    periods: &[TimePeriod],
    cutoff: Option<Timestamp>,
) -> Vec<PeriodStats> {
    let mut results: Vec<PeriodStats> = periods
        .iter()
        .map(|p| PeriodStats {
            name: p.name.clone(),
            stats: CategoryStats::empty(mode),
        })
        .collect();
    let mut unmatched = 0usize;

    for reading in readings {
        if cutoff.is_some_and(|c| reading.timestamp >= c) {
            continue;
        }
        let hour = reading.timestamp.hour();
        let category = classify(reading.value, thresholds, mode);
        let mut matched = false;
        for (period, result) in periods.iter().zip(results.iter_mut()) {
            if period.contains_hour(hour) {
                result.stats.record(category);
                matched = true;
            }
        }
        if !matched {
            unmatched += 1;
        }
    }

    if unmatched > 0 {
        debug!(unmatched, periods = periods.len(), "readings outside every time period");
    }

    results
}
