//! Insulin-on-board estimation
//!
//! Tracks bolus insulin that is still acting using a bilinear action curve:
//! activity rises linearly to a peak at 75/180 of the insulin duration and
//! falls linearly back to zero at the duration. The fraction still on board is
//! the area remaining under that curve. Basal delivery is reported per hour but
//! never counted as insulin on board.

use crate::types::{BasalRateChange, HourlyIobData, InsulinHistory, Timestamp};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};

/// Position of the activity peak as a fraction of the insulin duration
pub const PEAK_FRACTION: f64 = 75.0 / 180.0;

/// Fraction of a bolus still active `elapsed_hours` after delivery.
///
/// 1.0 at delivery, strictly decreasing, exactly 0.0 once
/// `elapsed_hours >= duration_hours`.
pub fn remaining_fraction(elapsed_hours: f64, duration_hours: f64) -> f64 {
    if duration_hours <= 0.0 || elapsed_hours >= duration_hours {
        return 0.0;
    }
    if elapsed_hours <= 0.0 {
        return 1.0;
    }

    let peak = duration_hours * PEAK_FRACTION;
    if elapsed_hours < peak {
        1.0 - elapsed_hours * elapsed_hours / (duration_hours * peak)
    } else {
        let remaining = duration_hours - elapsed_hours;
        remaining * remaining / (duration_hours * (duration_hours - peak))
    }
}

/// Estimator for hourly insulin delivery and activity
pub struct IobEstimator;

impl IobEstimator {
    /// One row per hour of `day` (local to `offset`), hour 0 first
    pub fn hourly(
        history: &InsulinHistory,
        day: NaiveDate,
        offset: FixedOffset,
        insulin_duration_hours: f64,
    ) -> Vec<HourlyIobData> {
        let day_start = local_midnight(day, offset);
        let basal_changes = sorted_basal(&history.basal_changes);

        (0..24u32)
            .map(|hour| {
                let at = day_start + Duration::hours(hour as i64);
                let from = at - Duration::hours(1);
                let bolus_in_previous_hour = history
                    .boluses
                    .iter()
                    .filter(|b| b.timestamp >= from && b.timestamp < at)
                    .map(|b| b.units)
                    .sum();

                HourlyIobData {
                    hour,
                    basal_in_previous_hour: basal_delivered(&basal_changes, from, at),
                    bolus_in_previous_hour,
                    active_iob: Self::iob_at(history, at, insulin_duration_hours),
                }
            })
            .collect()
    }

    /// Bolus insulin still active at `at`
    pub fn iob_at(history: &InsulinHistory, at: Timestamp, insulin_duration_hours: f64) -> f64 {
        history
            .boluses
            .iter()
            .filter(|b| b.timestamp <= at)
            .map(|b| {
                let elapsed = hours_between(b.timestamp, at);
                b.units * remaining_fraction(elapsed, insulin_duration_hours)
            })
            .sum()
    }
}

/// Instant of local midnight starting `day`
pub fn local_midnight(day: NaiveDate, offset: FixedOffset) -> Timestamp {
    let local = day.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(offset.local_minus_utc() as i64);
    DateTime::from_naive_utc_and_offset(utc, offset)
}

fn sorted_basal(changes: &[BasalRateChange]) -> Vec<BasalRateChange> {
    let mut sorted = changes.to_vec();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    sorted
}

/// Units delivered over `[from, to)` by a piecewise-constant basal schedule.
///
/// Each rate holds until the next change; before the first change nothing is
/// delivered.
fn basal_delivered(sorted: &[BasalRateChange], from: Timestamp, to: Timestamp) -> f64 {
    sorted
        .iter()
        .enumerate()
        .map(|(i, change)| {
            let segment_end = sorted.get(i + 1).map_or(to, |next| next.timestamp.min(to));
            let segment_start = change.timestamp.max(from);
            if segment_end > segment_start {
                change.units_per_hour * hours_between(segment_start, segment_end)
            } else {
                0.0
            }
        })
        .sum()
}

fn hours_between(start: Timestamp, end: Timestamp) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}
