//! Import payload parsing
//!
//! Splits a staged CSV payload into [`RawRow`]s and partitions them into
//! accepted events and rejected rows.

use chrono::{DateTime, Utc};

use crate::domain::production::ProductionEvent;
use crate::validation::{RawRow, RowRejection, validate_row};

/// Parses comma-separated text with a header row
///
/// Headers are trimmed and lowercased. Short rows leave the trailing fields
/// missing; extra cells beyond the header are ignored. Blank lines, and rows
/// whose cells are all blank after trimming, are skipped.
pub fn parse_rows(payload: &str) -> Result<Vec<RawRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect::<RawRow>();
        rows.push(row);
    }

    Ok(rows)
}

/// Result of validating every row of one payload
#[derive(Debug, Default)]
pub struct BatchValidation {
    pub valid: Vec<ProductionEvent>,
    pub rejected: Vec<RowRejection>,
}

impl BatchValidation {
    pub fn total(&self) -> usize {
        self.valid.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// True when there were rows and none of them passed
    pub fn all_rejected(&self) -> bool {
        !self.rejected.is_empty() && self.valid.is_empty()
    }
}

/// Validates every row (row numbers are 1-based) and keeps input order
pub fn validate_batch(rows: &[RawRow], now: DateTime<Utc>) -> BatchValidation {
    let mut batch = BatchValidation::default();

    for (idx, raw) in rows.iter().enumerate() {
        match validate_row(raw, idx + 1, now) {
            Ok(event) => batch.valid.push(event),
            Err(rejection) => batch.rejected.push(rejection),
        }
    }

    batch
}
