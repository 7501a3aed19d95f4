//! Input record validation

use crate::error::{PredictorError, Result};
use crate::preprocessing::Record;
use serde_json::Value;

/// Fields every prediction request must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "experience_years",
    "education_level",
    "company_size",
    "employment_type",
    "remote_ratio",
    "work_year",
];

/// Check presence of the required fields and the numeric ranges.
///
/// All problems in the record are collected into one
/// [`PredictorError::Validation`]; a `null` value counts as missing.
pub fn validate_record(record: &Record) -> Result<()> {
    let mut errors: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| record.get(**field).map_or(true, Value::is_null))
        .map(|field| format!("Missing required field: {}", field))
        .collect();

    if let Some(value) = present(record, "experience_years") {
        match value.as_f64() {
            Some(years) if years >= 0.0 => {}
            Some(_) => errors.push("experience_years must be non-negative".to_string()),
            None => errors.push("experience_years must be a number".to_string()),
        }
    }

    if let Some(value) = present(record, "remote_ratio") {
        match value.as_f64() {
            Some(ratio) if (0.0..=100.0).contains(&ratio) => {}
            Some(_) => errors.push("remote_ratio must be between 0 and 100".to_string()),
            None => errors.push("remote_ratio must be a number".to_string()),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PredictorError::Validation(errors))
    }
}

fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|v| !v.is_null())
}
