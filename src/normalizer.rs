//! Reading normalization
//!
//! This module canonicalizes raw glucose readings before analysis:
//! - Stable sort by timestamp (duplicates keep their original order)
//! - Date, weekday and source filters applied ahead of every component
//!
//! Values are expected in mmol/L already; unit conversion lives on
//! [`GlucoseUnit`](crate::types::GlucoseUnit) and is only applied for display.

use crate::types::{GlucoseReading, GlucoseSource};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeMap;

/// Normalizer for producing sorted, filtered reading sequences
pub struct ReadingNormalizer;

impl ReadingNormalizer {
    /// Sort readings ascending by instant without dropping any entries
    pub fn normalize(readings: &[GlucoseReading]) -> Vec<GlucoseReading> {
        let mut sorted = readings.to_vec();
        // `sort_by` is stable, so equal timestamps keep input order
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        sorted
    }

    /// Keep readings whose local date lies in `[start, end]`
    pub fn filter_date_range(
        readings: &[GlucoseReading],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<GlucoseReading> {
        readings
            .iter()
            .filter(|r| {
                let date = r.timestamp.date_naive();
                date >= start && date <= end
            })
            .cloned()
            .collect()
    }

    /// Keep readings whose local weekday is one of `days`
    pub fn filter_weekdays(readings: &[GlucoseReading], days: &[Weekday]) -> Vec<GlucoseReading> {
        readings
            .iter()
            .filter(|r| days.contains(&r.timestamp.weekday()))
            .cloned()
            .collect()
    }

    /// Readings recorded on one local calendar date
    pub fn readings_for_date(readings: &[GlucoseReading], date: NaiveDate) -> Vec<GlucoseReading> {
        Self::filter_date_range(readings, date, date)
    }

    /// Keep readings from a single source (sensor or fingerstick)
    pub fn filter_source(readings: &[GlucoseReading], source: GlucoseSource) -> Vec<GlucoseReading> {
        readings
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect()
    }

    /// Group readings by local calendar date, preserving order within each day
    pub fn split_by_date(readings: &[GlucoseReading]) -> BTreeMap<NaiveDate, Vec<GlucoseReading>> {
        let mut days: BTreeMap<NaiveDate, Vec<GlucoseReading>> = BTreeMap::new();
        for reading in readings {
            days.entry(reading.timestamp.date_naive())
                .or_default()
                .push(reading.clone());
        }
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(day: u32, hour: u32, minute: u32) -> crate::types::Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_sorts_ascending() {
        let readings = vec![
            GlucoseReading::cgm(at(16, 8, 0), 6.0),
            GlucoseReading::cgm(at(15, 8, 0), 5.0),
            GlucoseReading::cgm(at(15, 12, 0), 7.0),
        ];
        let sorted = ReadingNormalizer::normalize(&readings);
        let values: Vec<f64> = sorted.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![5.0, 7.0, 6.0]);
        // input untouched
        assert_eq!(readings[0].value, 6.0);
    }

    #[test]
    fn test_duplicates_keep_relative_order() {
        let readings = vec![
            GlucoseReading::cgm(at(15, 9, 0), 9.0),
            GlucoseReading::cgm(at(15, 8, 0), 1.0),
            GlucoseReading::new(at(15, 8, 0), 2.0, GlucoseSource::Bg),
            GlucoseReading::cgm(at(15, 8, 0), 3.0),
        ];
        let sorted = ReadingNormalizer::normalize(&readings);
        let values: Vec<f64> = sorted.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 9.0]);
    }

    #[test]
    fn test_compares_instants_across_offsets() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        // 09:00+02:00 is 07:00Z, earlier than 08:00Z
        let early = plus_two.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let readings = vec![
            GlucoseReading::cgm(at(15, 8, 0), 8.0),
            GlucoseReading::cgm(early, 7.0),
        ];
        let sorted = ReadingNormalizer::normalize(&readings);
        assert_eq!(sorted[0].value, 7.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(ReadingNormalizer::normalize(&[]).is_empty());
        assert!(ReadingNormalizer::split_by_date(&[]).is_empty());
    }

    #[test]
    fn test_filters() {
        // 2024-01-15 is a Monday, 2024-01-20 a Saturday
        let readings = vec![
            GlucoseReading::cgm(at(15, 8, 0), 5.0),
            GlucoseReading::new(at(16, 8, 0), 6.0, GlucoseSource::Bg),
            GlucoseReading::cgm(at(20, 8, 0), 7.0),
        ];

        let range = ReadingNormalizer::filter_date_range(
            &readings,
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
        );
        assert_eq!(range.len(), 2);

        let weekend = ReadingNormalizer::filter_weekdays(&readings, &[Weekday::Sat, Weekday::Sun]);
        assert_eq!(weekend.len(), 1);
        assert_eq!(weekend[0].value, 7.0);

        let bg = ReadingNormalizer::filter_source(&readings, GlucoseSource::Bg);
        assert_eq!(bg.len(), 1);

        let days = ReadingNormalizer::split_by_date(&readings);
        assert_eq!(days.len(), 3);
        let one_day = ReadingNormalizer::readings_for_date(
            &readings,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        assert_eq!(one_day.len(), 1);
    }
}
