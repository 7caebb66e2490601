//! Row conversion
//!
//! Turns one raw field sequence into a [`ConvertedRow`] or a rejection.
//! Conversion is all-or-nothing: a single bad field rejects the whole row.

use chrono::{NaiveDateTime, Timelike};

use crate::header::ColumnIndices;
use crate::schema::{ColumnType, ConvertedRow, RowSchema, Value};
use crate::skip_log::SkipReason;

/// The only accepted datetime layout: day/month/year, 24-hour clock
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Result of converting one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted(ConvertedRow),
    Rejected(Rejection),
}

/// Why a row was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: SkipReason,
    /// Diagnostic detail, e.g. which column failed and how
    pub detail: String,
}

/// Converts rows of one file using that file's resolved indices
#[derive(Debug)]
pub struct RowConverter<'a> {
    schema: &'a RowSchema,
    indices: ColumnIndices,
    required_width: usize,
}

impl<'a> RowConverter<'a> {
    pub fn new(schema: &'a RowSchema, indices: ColumnIndices) -> Self {
        let required_width = indices.required_width();
        Self {
            schema,
            indices,
            required_width,
        }
    }

    pub fn schema(&self) -> &RowSchema {
        self.schema
    }

    pub fn convert<S: AsRef<str>>(&self, fields: &[S]) -> RowOutcome {
        if fields.len() < self.required_width {
            return RowOutcome::Rejected(Rejection {
                reason: SkipReason::MalformedRow,
                detail: format!(
                    "expected at least {} fields, got {}",
                    self.required_width,
                    fields.len()
                ),
            });
        }

        let mut values = Vec::with_capacity(self.schema.len());
        for (column, &index) in self.schema.columns().iter().zip(self.indices.as_slice()) {
            let raw = fields[index].as_ref().trim();
            match convert_field(raw, column.column_type) {
                Ok(value) => values.push(value),
                Err(err) => {
                    return RowOutcome::Rejected(Rejection {
                        reason: SkipReason::ConversionError,
                        detail: format!("column '{}' ({}): {}", column.name, column.column_type, err),
                    });
                },
            }
        }

        RowOutcome::Accepted(ConvertedRow::new(values))
    }
}

/// Convert one trimmed field according to its column type
pub fn convert_field(raw: &str, column_type: ColumnType) -> Result<Value, String> {
    match column_type {
        ColumnType::DateTime => parse_datetime(raw).map(Value::DateTime),
        ColumnType::Integer => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| format!("'{}' is not an integer: {}", raw, e)),
        ColumnType::String => Ok(Value::Text(raw.to_string())),
    }
}

/// Parse `DATETIME_FORMAT` exactly: `d/m/yyyy h:m:s`, one or two digits per
/// part except the four-digit year, a single space, no sign, no leap second.
fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    if !has_datetime_shape(raw) {
        return Err(format!("'{}' does not match {}", raw, DATETIME_FORMAT));
    }

    let parsed = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|e| format!("'{}' does not match {}: {}", raw, DATETIME_FORMAT, e))?;

    // chrono encodes second 60 as an overflowing nanosecond
    if parsed.nanosecond() >= 1_000_000_000 {
        return Err(format!("'{}' has a leap second", raw));
    }
    Ok(parsed)
}

fn has_datetime_shape(raw: &str) -> bool {
    fn digits(part: &str, min: usize, max: usize) -> bool {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    }

    let Some((date, time)) = raw.split_once(' ') else {
        return false;
    };

    let date: Vec<&str> = date.split('/').collect();
    let time: Vec<&str> = time.split(':').collect();

    matches!(date.as_slice(), [d, m, y] if digits(d, 1, 2) && digits(m, 1, 2) && digits(y, 4, 4))
        && matches!(time.as_slice(), [h, min, sec] if digits(h, 1, 2) && digits(min, 1, 2) && digits(sec, 1, 2))
}
