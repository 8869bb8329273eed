// 🔤 Column Types - closed set of storage types and their text conversions
// Every (type, raw text) pair converts to a native value, and back

use crate::errors::LedgerError;
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{FromSql, ToSql, ToSqlOutput, Value, ValueRef};

// ============================================================================
// COLUMN TYPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Text,

    /// Double precision float
    Real,

    /// Calendar date/time, written and read with the configured date format
    Timestamp,

    /// Any other declared tag. Values pass through as text.
    Other(String),
}

impl ColumnType {
    /// Classify a declared tag (case-insensitive)
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "TEXT" => ColumnType::Text,
            "REAL" | "FLOAT" | "DOUBLE" => ColumnType::Real,
            "TIMESTAMP" => ColumnType::Timestamp,
            _ => ColumnType::Other(tag.to_string()),
        }
    }

    /// Convert one raw field into the value stored for it.
    /// Empty text is NULL for every column type.
    pub fn parse_field(&self, raw: &str, date_format: &str) -> Result<FieldValue> {
        if raw.is_empty() {
            return Ok(FieldValue::Null);
        }

        match self {
            ColumnType::Text | ColumnType::Other(_) => Ok(FieldValue::Text(raw.to_string())),
            ColumnType::Real => raw
                .trim()
                .parse::<f64>()
                .map(FieldValue::Real)
                .with_context(|| format!("Invalid REAL value {:?}", raw)),
            ColumnType::Timestamp => parse_timestamp(raw, date_format).map(FieldValue::Timestamp),
        }
    }

    /// Render a stored value as text. NULL renders as an empty field.
    pub fn format_value(&self, value: ValueRef<'_>, date_format: &str) -> Result<String> {
        match (self, value) {
            (_, ValueRef::Null) => Ok(String::new()),
            (ColumnType::Timestamp, value) => {
                let ts = NaiveDateTime::column_result(value)
                    .context("TIMESTAMP column holds a non-timestamp value")?;
                Ok(ts.format(date_format).to_string())
            }
            (_, ValueRef::Integer(i)) => Ok(i.to_string()),
            (_, ValueRef::Real(f)) => Ok(f.to_string()),
            (_, ValueRef::Text(bytes)) | (_, ValueRef::Blob(bytes)) => {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

// ============================================================================
// FIELD VALUE
// ============================================================================

/// Native value bound into an insert statement
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Real(f64),
    Timestamp(NaiveDateTime),
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            FieldValue::Text(s) => s.to_sql(),
            FieldValue::Real(f) => f.to_sql(),
            FieldValue::Timestamp(ts) => ts.to_sql(),
        }
    }
}

/// Parse a timestamp field. Date-only formats land on midnight.
pub fn parse_timestamp(raw: &str, date_format: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, date_format) {
        return Ok(ts);
    }

    NaiveDate::parse_from_str(raw, date_format)
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|_| {
            LedgerError::InvalidDate {
                input: raw.to_string(),
                format: date_format.to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::DEFAULT_DATE_FORMAT;

    fn jan(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, day)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_tags_are_classified() {
        assert_eq!(ColumnType::from_tag("TEXT"), ColumnType::Text);
        assert_eq!(ColumnType::from_tag("timestamp"), ColumnType::Timestamp);
        assert_eq!(ColumnType::from_tag("Float"), ColumnType::Real);
        assert_eq!(
            ColumnType::from_tag("INTEGER"),
            ColumnType::Other("INTEGER".to_string())
        );
    }

    #[test]
    fn test_empty_field_is_null_for_every_type() {
        for tag in ["TEXT", "REAL", "TIMESTAMP", "BLOB"] {
            let value = ColumnType::from_tag(tag)
                .parse_field("", DEFAULT_DATE_FORMAT)
                .unwrap();
            assert_eq!(value, FieldValue::Null, "tag {}", tag);
        }
    }

    #[test]
    fn test_parse_fields() {
        let fmt = DEFAULT_DATE_FORMAT;

        assert_eq!(
            ColumnType::Timestamp.parse_field("01/02/2023", fmt).unwrap(),
            FieldValue::Timestamp(jan(2))
        );
        assert_eq!(
            ColumnType::Real.parse_field(" 12.5 ", fmt).unwrap(),
            FieldValue::Real(12.5)
        );
        assert_eq!(
            ColumnType::Other("INTEGER".into()).parse_field("7", fmt).unwrap(),
            FieldValue::Text("7".to_string())
        );
    }

    #[test]
    fn test_bad_fields_are_errors() {
        let fmt = DEFAULT_DATE_FORMAT;

        assert!(ColumnType::Real.parse_field("$12", fmt).is_err());

        let err = ColumnType::Timestamp.parse_field("2023-01-02", fmt).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_format_values() {
        let fmt = DEFAULT_DATE_FORMAT;

        assert_eq!(
            ColumnType::Timestamp
                .format_value(ValueRef::Text(b"2023-01-02 00:00:00"), fmt)
                .unwrap(),
            "01/02/2023"
        );
        assert_eq!(ColumnType::Text.format_value(ValueRef::Null, fmt).unwrap(), "");
        assert_eq!(ColumnType::Real.format_value(ValueRef::Real(12.5), fmt).unwrap(), "12.5");
        assert_eq!(ColumnType::Text.format_value(ValueRef::Integer(3), fmt).unwrap(), "3");
        assert_eq!(
            ColumnType::Text.format_value(ValueRef::Text(b"apple"), fmt).unwrap(),
            "apple"
        );
    }
}
