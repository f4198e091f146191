use chrono::{DateTime, Datelike, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::data::Dataset;

pub const TIMESTAMP: &str = "timestamp";
pub const MONTH: &str = "month";
pub const MONTH_NAME: &str = "month_name";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const DAY_NAME: &str = "day_name";

static NULL: Value = Value::Null;

/// Canonical month order, Gregorian, English abbreviations
pub const MONTH_ORDER: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Canonical weekday order starting on Monday (day_of_week 0)
pub const DAY_ORDER: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

/// Structural problems that make calendar fields impossible to derive
#[derive(Debug, Error, PartialEq)]
pub enum EnrichError {
    #[error("required column '{0}' is missing from the dataset")]
    MissingField(String),

    #[error("row {row} has an invalid timestamp: {value}")]
    InvalidTimestamp { row: usize, value: String },
}

/// Calendar fields derived from one epoch-millisecond timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFields {
    pub month: u32,
    pub month_name: &'static str,
    pub day_of_week: u32,
    pub day_name: &'static str,
}

impl CalendarFields {
    /// Derive the fields in UTC; `None` when the instant is out of range
    pub fn from_millis(millis: i64) -> Option<Self> {
        let instant = DateTime::<Utc>::from_timestamp_millis(millis)?;
        let month = instant.month();
        let day_of_week = instant.weekday().num_days_from_monday();
        Some(Self {
            month,
            month_name: MONTH_ORDER[(month - 1) as usize],
            day_of_week,
            day_name: DAY_ORDER[day_of_week as usize],
        })
    }
}

/// Append `month`, `month_name`, `day_of_week` and `day_name` to every row.
/// An empty dataset passes through untouched.
pub fn enrich(dataset: &Dataset) -> Result<Dataset, EnrichError> {
    if dataset.is_empty() {
        return Ok(dataset.clone());
    }
    if !dataset.has_column(TIMESTAMP) {
        return Err(EnrichError::MissingField(TIMESTAMP.to_string()));
    }

    let derived = [MONTH, MONTH_NAME, DAY_OF_WEEK, DAY_NAME];
    let enriched = dataset.map_rows::<_, EnrichError>(&derived, |row_number, row| {
        let raw = row.get(TIMESTAMP).unwrap_or(&NULL);
        let fields = timestamp_millis(raw)
            .and_then(CalendarFields::from_millis)
            .ok_or_else(|| EnrichError::InvalidTimestamp {
                row: row_number,
                value: raw.to_string(),
            })?;

        let mut row = row.clone();
        row.insert(MONTH.to_string(), Value::from(fields.month));
        row.insert(MONTH_NAME.to_string(), Value::from(fields.month_name));
        row.insert(DAY_OF_WEEK.to_string(), Value::from(fields.day_of_week));
        row.insert(DAY_NAME.to_string(), Value::from(fields.day_name));
        Ok(row)
    })?;

    debug!("Derived calendar fields for {} rows", enriched.len());
    Ok(enriched)
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    }
}
