//! Registry line parsing
//!
//! Each line of the registry is a pipe-delimited row:
//!
//! ```text
//! 0 RNC | 1 legal name | 2 trade name | 3 activity | 4-7 (unused) | 8 start date | 9 status | 10 payment regime
//! ```
//!
//! Parsing is pure: a line either becomes a [`RegistryRecord`] or a
//! [`ParseError`] describing why it was skipped.

use crate::error::ParseError;
use crate::types::RegistryRecord;
use chrono::NaiveDate;
use std::borrow::Cow;

/// Minimum number of fields a line must carry
pub const MIN_FIELDS: usize = 10;

/// Start date layout (DD/MM/YYYY)
pub const DATE_FORMAT: &str = "%d/%m/%Y";

const FIELD_SEPARATOR: char = '|';

mod column {
    pub const REGISTRATION_NUMBER: usize = 0;
    pub const LEGAL_NAME: usize = 1;
    pub const TRADE_NAME: usize = 2;
    pub const ACTIVITY: usize = 3;
    pub const START_DATE: usize = 8;
    pub const STATUS: usize = 9;
    pub const PAYMENT_REGIME: usize = 10;
}

/// Parse one line (without its terminator) into a record
pub fn parse_line(line: &str) -> Result<RegistryRecord, ParseError> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();

    if fields.len() < MIN_FIELDS {
        return Err(ParseError::TooFewFields {
            found: fields.len(),
            required: MIN_FIELDS,
        });
    }

    let registration_number = fields[column::REGISTRATION_NUMBER];
    if registration_number.is_empty() {
        return Err(ParseError::MissingRegistrationNumber);
    }

    let operations_start_date = parse_date(fields[column::START_DATE])?;

    let payment_regime = fields
        .get(column::PAYMENT_REGIME)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string());

    Ok(RegistryRecord {
        registration_number: registration_number.to_string(),
        legal_name: fields[column::LEGAL_NAME].to_string(),
        trade_name: fields[column::TRADE_NAME].to_string(),
        activity_description: fields[column::ACTIVITY].to_string(),
        operations_start_date,
        status: fields[column::STATUS].to_string(),
        payment_regime,
    })
}

/// Parse a trimmed DD/MM/YYYY field; blank means "no date"
pub fn parse_date(value: &str) -> Result<Option<NaiveDate>, ParseError> {
    if value.is_empty() {
        return Ok(None);
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|e| ParseError::BadDate {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Turn raw line bytes into text, dropping the line terminator
///
/// Valid UTF-8 is borrowed as-is. Anything else is read as ISO-8859-1, where
/// every byte maps to the code point of the same value.
pub fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

    match std::str::from_utf8(raw) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(raw.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Whether a decoded line carries nothing to parse
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
