//! Production record validation
//!
//! Turns one untrusted CSV row into a [`ProductionEvent`], or into a
//! [`RowRejection`] listing every problem found with the row.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::production::{EventType, ProductionEvent};

pub const MAX_QUANTITY: f64 = 10_000.0;
pub const MAX_NOTES_CHARS: usize = 1000;
pub const YEARS_BACK: u32 = 10;
pub const YEARS_FORWARD: u32 = 1;

/// Untyped row as read from the payload: header name -> raw cell text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Trimmed value of `field`; empty after trimming counts as missing
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// Every violation found for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    /// 1-based position in the batch
    pub row: usize,
    /// Messages, each prefixed with `Row <n>: `
    pub violations: Vec<String>,
}

impl std::fmt::Display for RowRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.violations.join("; "))
    }
}

/// Validates and normalizes one row against the reference instant `now`
pub fn validate_row(
    raw: &RawRow,
    row: usize,
    now: DateTime<Utc>,
) -> Result<ProductionEvent, RowRejection> {
    let mut violations = Vec::new();
    let mut reject = |msg: String| violations.push(format!("Row {}: {}", row, msg));

    let species_id = match raw.get("species_id") {
        None => {
            reject("species_id is required".to_string());
            None
        }
        Some(s) => match parse_canonical_uuid(s) {
            Some(id) => Some(id),
            None => {
                reject(format!("species_id '{}' is not a valid UUID", s));
                None
            }
        },
    };

    let event_type = match raw.get("event_type") {
        None => {
            reject("event_type is required".to_string());
            None
        }
        Some(s) => match EventType::parse(s) {
            Some(t) => Some(t),
            None => {
                reject(format!(
                    "event_type '{}' is not allowed (expected one of: {})",
                    s,
                    EventType::allowed_values()
                ));
                None
            }
        },
    };

    let date = match raw.get("date") {
        None => {
            reject("date is required".to_string());
            None
        }
        Some(s) => match parse_date(s) {
            None => {
                reject(format!("date '{}' is not a valid date", s));
                None
            }
            Some(date) => {
                let (earliest, latest) = date_window(now);
                if date < earliest || date > latest {
                    reject(format!(
                        "date '{}' must be within the last {} years and the next {} year",
                        s, YEARS_BACK, YEARS_FORWARD
                    ));
                    None
                } else {
                    Some(date)
                }
            }
        },
    };

    let quantity = match raw.get("quantity") {
        None => Ok(None),
        Some(s) => match s.parse::<f64>() {
            Ok(q) if !q.is_finite() => Err(format!("quantity '{}' is not a number", s)),
            Ok(q) if q < 0.0 => Err(format!("quantity {} must not be negative", s)),
            Ok(q) if q > MAX_QUANTITY => Err(format!(
                "quantity {} exceeds the maximum of {}",
                s, MAX_QUANTITY
            )),
            Ok(q) => Ok(Some(q)),
            Err(_) => Err(format!("quantity '{}' is not a number", s)),
        },
    };
    let quantity = quantity.unwrap_or_else(|msg| {
        reject(msg);
        None
    });

    let notes = raw.get("notes").map(str::to_string);
    if let Some(n) = &notes {
        let len = n.chars().count();
        if len > MAX_NOTES_CHARS {
            reject(format!(
                "notes are {} characters long (maximum {})",
                len, MAX_NOTES_CHARS
            ));
        }
    }

    match (species_id, event_type, date) {
        (Some(species_id), Some(event_type), Some(date)) if violations.is_empty() => {
            Ok(ProductionEvent {
                species_id,
                event_type,
                date,
                quantity,
                notes,
            })
        }
        _ => Err(RowRejection { row, violations }),
    }
}

/// Accepts only the hyphenated 8-4-4-4-12 form
fn parse_canonical_uuid(s: &str) -> Option<Uuid> {
    if s.len() != 36 {
        return None;
    }
    Uuid::try_parse(s).ok()
}

/// Parses RFC 3339, ISO date-times without offset, and plain dates (UTC)
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Inclusive `[now - 10 years, now + 1 year]`
fn date_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let earliest = now
        .checked_sub_months(Months::new(12 * YEARS_BACK))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let latest = now
        .checked_add_months(Months::new(12 * YEARS_FORWARD))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (earliest, latest)
}
