//! Ambulatory Glucose Profile
//!
//! Folds readings from any number of days onto a single 24-hour timeline of
//! 288 five-minute slots and computes percentile bands for each slot. Date or
//! weekday filtering is done by the caller before calling in here.

use crate::stats::{mean, percentile_sorted, population_std_dev};
use crate::types::{AgpTimeSlotStats, GlucoseReading, GlycemicSummary, MGDL_PER_MMOL};
use chrono::Timelike;

/// Slot width in minutes
pub const SLOT_MINUTES: u32 = 5;

/// Number of slots in a day
pub const SLOTS_PER_DAY: usize = (24 * 60 / SLOT_MINUTES) as usize;

/// AGP calculator
pub struct AgpCalculator;

impl AgpCalculator {
    /// Compute the 288-slot profile, "00:00" first.
    ///
    /// Slots without readings are present with `count == 0` and zeroed stats.
    pub fn compute(readings: &[GlucoseReading]) -> Vec<AgpTimeSlotStats> {
        let mut slots: Vec<Vec<f64>> = vec![Vec::new(); SLOTS_PER_DAY];
        for reading in readings {
            slots[slot_index(reading)].push(reading.value);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, mut values)| {
                values.sort_by(f64::total_cmp);
                slot_stats(index, &values)
            })
            .collect()
    }

    /// Mean, variability and GMI over all readings
    pub fn glycemic_summary(readings: &[GlucoseReading]) -> GlycemicSummary {
        if readings.is_empty() {
            return GlycemicSummary::default();
        }
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        let mean_value = mean(&values);
        let sd = population_std_dev(&values);
        let cv_percent = if mean_value > 0.0 {
            sd / mean_value * 100.0
        } else {
            0.0
        };

        GlycemicSummary {
            count: values.len() as u32,
            mean: mean_value,
            sd,
            cv_percent,
            gmi_percent: 3.31 + 0.02392 * mean_value * MGDL_PER_MMOL,
        }
    }
}

/// Slot label "HH:MM" for a slot index
pub fn slot_label(index: usize) -> String {
    let minutes = index as u32 * SLOT_MINUTES;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn slot_index(reading: &GlucoseReading) -> usize {
    let minutes = reading.timestamp.hour() * 60 + reading.timestamp.minute();
    (minutes / SLOT_MINUTES) as usize
}

fn slot_stats(index: usize, sorted: &[f64]) -> AgpTimeSlotStats {
    let time_slot = slot_label(index);
    if sorted.is_empty() {
        return AgpTimeSlotStats {
            time_slot,
            lowest: 0.0,
            p10: 0.0,
            p25: 0.0,
            p50: 0.0,
            p75: 0.0,
            p90: 0.0,
            highest: 0.0,
            count: 0,
        };
    }

    AgpTimeSlotStats {
        time_slot,
        lowest: sorted[0],
        p10: percentile_sorted(sorted, 0.10),
        p25: percentile_sorted(sorted, 0.25),
        p50: percentile_sorted(sorted, 0.50),
        p75: percentile_sorted(sorted, 0.75),
        p90: percentile_sorted(sorted, 0.90),
        highest: sorted[sorted.len() - 1],
        count: sorted.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn reading(day: u32, hour: u32, minute: u32, value: f64) -> GlucoseReading {
        let ts = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
            .unwrap();
        GlucoseReading::cgm(ts, value)
    }

    #[test]
    fn test_always_288_contiguous_slots() {
        let profile = AgpCalculator::compute(&[]);
        assert_eq!(profile.len(), 288);
        assert_eq!(profile[0].time_slot, "00:00");
        assert_eq!(profile[1].time_slot, "00:05");
        assert_eq!(profile[287].time_slot, "23:55");
        assert!(profile.iter().all(|s| s.count == 0 && s.p50 == 0.0 && s.highest == 0.0));
    }

    #[test]
    fn test_two_day_median() {
        let readings = vec![reading(15, 8, 0, 5.0), reading(16, 8, 3, 7.0)];
        let profile = AgpCalculator::compute(&readings);
        let slot = profile.iter().find(|s| s.time_slot == "08:00").unwrap();
        assert_eq!(slot.count, 2);
        assert!((slot.p50 - 6.0).abs() < 1e-12);
        assert_eq!(slot.lowest, 5.0);
        assert_eq!(slot.highest, 7.0);
    }

    #[test]
    fn test_percentiles_ordered_and_counts_sum() {
        let mut readings = Vec::new();
        for day in 1..=14 {
            for step in 0..48 {
                let minute = step * 30;
                let value = 4.0 + ((day * 7 + step) % 11) as f64 * 0.8;
                readings.push(reading(day, minute / 60, minute % 60, value));
            }
        }

        let profile = AgpCalculator::compute(&readings);
        let total: u32 = profile.iter().map(|s| s.count).sum();
        assert_eq!(total as usize, readings.len());

        for slot in profile.iter().filter(|s| s.count > 0) {
            assert!(slot.lowest <= slot.p10);
            assert!(slot.p10 <= slot.p25);
            assert!(slot.p25 <= slot.p50);
            assert!(slot.p50 <= slot.p75);
            assert!(slot.p75 <= slot.p90);
            assert!(slot.p90 <= slot.highest);
        }
    }

    #[test]
    fn test_local_time_of_day_is_used() {
        let plus_one = FixedOffset::east_opt(3600).unwrap();
        let ts = plus_one.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let profile = AgpCalculator::compute(&[GlucoseReading::cgm(ts, 6.0)]);
        assert_eq!(profile[96].time_slot, "08:00");
        assert_eq!(profile[96].count, 1);
    }

    #[test]
    fn test_glycemic_summary() {
        let readings = vec![reading(15, 8, 0, 5.0), reading(15, 9, 0, 7.0)];
        let summary = AgpCalculator::glycemic_summary(&readings);
        assert_eq!(summary.count, 2);
        assert!((summary.mean - 6.0).abs() < 1e-12);
        assert!((summary.sd - 1.0).abs() < 1e-12);
        assert!((summary.cv_percent - 100.0 / 6.0).abs() < 1e-9);
        // 6.0 mmol/L is ~108 mg/dL
        assert!((summary.gmi_percent - (3.31 + 0.02392 * 6.0 * 18.0182)).abs() < 1e-9);

        assert_eq!(AgpCalculator::glycemic_summary(&[]), GlycemicSummary::default());
    }

    #[test]
    fn test_idempotent() {
        let readings = vec![reading(15, 8, 0, 5.0), reading(16, 8, 0, 7.0)];
        assert_eq!(AgpCalculator::compute(&readings), AgpCalculator::compute(&readings));
    }
}
