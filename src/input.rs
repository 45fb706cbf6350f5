//! Input parsing and validation
//!
//! Reads glucose readings and insulin history from JSON arrays or NDJSON and
//! checks readings against the ingestion contract (finite, non-negative
//! values). File formats beyond JSON are handled outside this crate.

use crate::error::ComputeError;
use crate::types::{GlucoseReading, GlucoseUnit, InsulinHistory};
use serde::de::DeserializeOwned;

/// Adapter for turning exported JSON into reading sequences
pub struct ReadingAdapter;

impl ReadingAdapter {
    /// Parse a JSON array
    pub fn parse_array<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse NDJSON (one record per line, blank lines ignored)
    pub fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Parse insulin history from a JSON object
    pub fn parse_insulin_history(json: &str) -> Result<InsulinHistory, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert readings recorded in `unit` into mmol/L
    pub fn to_canonical(readings: Vec<GlucoseReading>, unit: GlucoseUnit) -> Vec<GlucoseReading> {
        readings
            .into_iter()
            .map(|mut r| {
                r.value = unit.to_canonical(r.value);
                r
            })
            .collect()
    }

    /// Check every reading; returns one error per invalid reading
    pub fn validate_readings(readings: &[GlucoseReading]) -> Vec<ComputeError> {
        readings
            .iter()
            .enumerate()
            .filter_map(|(index, reading)| {
                let reason = if !reading.value.is_finite() {
                    "value is not a finite number"
                } else if reading.value < 0.0 {
                    "value is negative"
                } else {
                    return None;
                };
                Some(ComputeError::InvalidReading {
                    index,
                    reason: reason.to_string(),
                })
            })
            .collect()
    }

    /// Check every bolus and basal record; returns one error per invalid record
    pub fn validate_insulin_history(history: &InsulinHistory) -> Vec<ComputeError> {
        let boluses = history
            .boluses
            .iter()
            .enumerate()
            .filter_map(|(index, bolus)| {
                dose_problem(bolus.units).map(|reason| ComputeError::InvalidInsulin {
                    kind: "bolus",
                    index,
                    reason: format!("units {}", reason),
                })
            });
        let basal = history
            .basal_changes
            .iter()
            .enumerate()
            .filter_map(|(index, change)| {
                dose_problem(change.units_per_hour).map(|reason| ComputeError::InvalidInsulin {
                    kind: "basal",
                    index,
                    reason: format!("units_per_hour {}", reason),
                })
            });
        boluses.chain(basal).collect()
    }
}

fn dose_problem(amount: f64) -> Option<&'static str> {
    if !amount.is_finite() {
        Some("is not a finite number")
    } else if amount < 0.0 {
        Some("is negative")
    } else {
        None
    }
}
