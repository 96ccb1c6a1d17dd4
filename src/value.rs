/// Value Module
///
/// Typed values exchanged between the shell, the SQL builder and SQLite.
/// `ColumnKind` is the closed set of semantic column types the toolkit
/// understands; each kind owns how raw text is coerced into a `Value` and
/// how a stored SQLite value is read back.
use crate::core::{RecadminError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Storage format for timestamps; matches SQLite's `CURRENT_TIMESTAMP`.
const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const TRUTHY: [&str; 4] = ["true", "1", "yes", "y"];
const FALSY: [&str; 4] = ["false", "0", "no", "n"];

/// Semantic kind of a column, derived from its declared SQLite type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Integer,
    Boolean,
    Timestamp,
    Text,
}

impl ColumnKind {
    /// Classifies a declared SQLite type name.
    ///
    /// Matching is case-insensitive and ordered so that `BOOLEAN` and
    /// `DATETIME` are not swallowed by the `INT` rule.
    pub fn from_declared_type(type_name: &str) -> Self {
        let upper = type_name.to_ascii_uppercase();
        if upper.contains("BOOL") {
            ColumnKind::Boolean
        } else if upper.contains("TIMESTAMP") || upper.contains("DATETIME") {
            ColumnKind::Timestamp
        } else if upper.contains("INT") {
            ColumnKind::Integer
        } else {
            ColumnKind::Text
        }
    }

    /// Parses raw text into a value of this kind.
    pub fn parse(self, raw: &str) -> Option<Value> {
        match self {
            ColumnKind::Integer => raw.parse::<i64>().ok().map(Value::Integer),
            ColumnKind::Boolean => parse_bool(raw).map(Value::Boolean),
            ColumnKind::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
            ColumnKind::Text => Some(Value::Text(raw.to_string())),
        }
    }

    /// Reads a stored SQLite value back as this kind.
    ///
    /// Values that do not fit the kind (SQLite is dynamically typed) are
    /// returned in their storage representation rather than rejected.
    pub fn decode(self, value: ValueRef<'_>) -> Value {
        match (self, value) {
            (_, ValueRef::Null) => Value::Null,
            (ColumnKind::Boolean, ValueRef::Integer(i @ (0 | 1))) => Value::Boolean(i == 1),
            (ColumnKind::Timestamp, ValueRef::Text(t)) => {
                let text = String::from_utf8_lossy(t);
                match parse_timestamp(&text) {
                    Some(ts) => Value::Timestamp(ts),
                    None => Value::Text(text.into_owned()),
                }
            }
            (_, other) => Value::from(other),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// A typed column value.
///
/// `Real` and `Blob` only appear when reading rows back; coercion never
/// produces them.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Text(String),
    Real(f64),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Display form used by the shell. Null renders as an empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::Text(s) => f.write_str(s),
            Value::Real(r) => write!(f, "{}", r),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Boolean(b) => ToSqlOutput::from(*b),
            Value::Timestamp(ts) => ToSqlOutput::from(ts.format(STORAGE_FORMAT).to_string()),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Real(r) => ToSqlOutput::from(*r),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Real(r) => serializer.serialize_f64(*r),
            other => serializer.collect_str(other),
        }
    }
}

/// Coerces a raw text token into a value of the given kind.
///
/// # Errors
///
/// Returns `RecadminError::InvalidValue` when the text does not parse for
/// the kind. Callers never pass an empty token; blank input is handled at
/// the prompt.
///
/// # Examples
///
/// ```
/// use recadmin::value::{coerce, ColumnKind, Value};
///
/// assert_eq!(coerce("42", ColumnKind::Integer).unwrap(), Value::Integer(42));
/// assert!(coerce("abc", ColumnKind::Integer).is_err());
/// ```
pub fn coerce(raw: &str, kind: ColumnKind) -> Result<Value> {
    kind.parse(raw).ok_or_else(|| RecadminError::InvalidValue {
        column: None,
        kind,
        raw: raw.to_string(),
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    let lowered = raw.to_lowercase();
    if TRUTHY.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSY.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Accepts ISO-8601 date-times with `T` or space separator, optional
/// fractional seconds and an optional UTC offset (normalised to UTC).
/// A bare date means midnight.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.naive_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_kind_from_declared_type() {
        assert_eq!(ColumnKind::from_declared_type("INTEGER"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_declared_type("bigint"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_declared_type("BOOLEAN"), ColumnKind::Boolean);
        assert_eq!(ColumnKind::from_declared_type("DATETIME"), ColumnKind::Timestamp);
        assert_eq!(ColumnKind::from_declared_type("timestamp"), ColumnKind::Timestamp);
        assert_eq!(ColumnKind::from_declared_type("VARCHAR(255)"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_declared_type(""), ColumnKind::Text);
        assert_eq!(ColumnKind::from_declared_type("REAL"), ColumnKind::Text);
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce("42", ColumnKind::Integer).unwrap(), Value::Integer(42));
        assert_eq!(coerce("-7", ColumnKind::Integer).unwrap(), Value::Integer(-7));
        assert!(coerce("abc", ColumnKind::Integer).is_err());
        assert!(coerce("4.2", ColumnKind::Integer).is_err());
        assert!(coerce(" 42", ColumnKind::Integer).is_err());
    }

    #[test]
    fn test_coerce_boolean() {
        for token in ["true", "TRUE", "1", "Yes", "y"] {
            assert_eq!(coerce(token, ColumnKind::Boolean).unwrap(), Value::Boolean(true));
        }
        for token in ["false", "False", "0", "NO", "n"] {
            assert_eq!(coerce(token, ColumnKind::Boolean).unwrap(), Value::Boolean(false));
        }
        match coerce("maybe", ColumnKind::Boolean) {
            Err(RecadminError::InvalidValue { kind, raw, .. }) => {
                assert_eq!(kind, ColumnKind::Boolean);
                assert_eq!(raw, "maybe");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_timestamp() {
        assert_eq!(
            coerce("2024-03-01T12:30:00", ColumnKind::Timestamp).unwrap(),
            Value::Timestamp(ts(2024, 3, 1, 12, 30, 0))
        );
        assert_eq!(
            coerce("2024-03-01 12:30:00", ColumnKind::Timestamp).unwrap(),
            Value::Timestamp(ts(2024, 3, 1, 12, 30, 0))
        );
        assert_eq!(
            coerce("2024-03-01T12:30:00+02:00", ColumnKind::Timestamp).unwrap(),
            Value::Timestamp(ts(2024, 3, 1, 10, 30, 0))
        );
        assert_eq!(
            coerce("2024-03-01", ColumnKind::Timestamp).unwrap(),
            Value::Timestamp(ts(2024, 3, 1, 0, 0, 0))
        );
        assert!(coerce("03/01/2024", ColumnKind::Timestamp).is_err());
        assert!(coerce("yesterday", ColumnKind::Timestamp).is_err());
    }

    #[test]
    fn test_coerce_text_passthrough() {
        assert_eq!(
            coerce(" a@x.com ", ColumnKind::Text).unwrap(),
            Value::Text(" a@x.com ".to_string())
        );
    }

    #[test]
    fn test_decode_by_kind() {
        assert_eq!(ColumnKind::Boolean.decode(ValueRef::Integer(1)), Value::Boolean(true));
        assert_eq!(ColumnKind::Boolean.decode(ValueRef::Integer(7)), Value::Integer(7));
        assert_eq!(ColumnKind::Integer.decode(ValueRef::Null), Value::Null);
        assert_eq!(
            ColumnKind::Timestamp.decode(ValueRef::Text(b"2024-03-01 12:30:00")),
            Value::Timestamp(ts(2024, 3, 1, 12, 30, 0))
        );
        assert_eq!(
            ColumnKind::Timestamp.decode(ValueRef::Text(b"soon")),
            Value::Text("soon".to_string())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(
            Value::Timestamp(ts(2024, 3, 1, 12, 30, 0)).to_string(),
            "2024-03-01T12:30:00"
        );
        assert_eq!(Value::Blob(vec![1, 2, 3]).to_string(), "<BLOB: 3 bytes>");
    }

    #[test]
    fn test_timestamp_storage_round_trip() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let value = Value::Timestamp(ts(2024, 3, 1, 12, 30, 5));
        let stored: String = conn
            .query_row("SELECT ?1", [&value], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "2024-03-01 12:30:05");
    }
}
