//! Cell values carried from a source table to the warehouse.

use base64::Engine;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::helpers::quote_string_single;

/// A single source cell.
///
/// Mirrors SQLite's storage classes. Values are passed through as stored;
/// the warehouse casts them to the column type on insert.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Only produced for metadata rows; SQLite has no boolean storage class.
    Boolean(bool),
}

/// One row, in column order.
pub type Row = Vec<Value>;

impl Value {
    /// Render as a Snowflake SQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) if f.is_finite() => {
                let s = f.to_string();
                if s.contains('.') {
                    s
                } else {
                    format!("{s}.0")
                }
            }
            Value::Real(f) => format!("'{}'::DOUBLE", float_keyword(*f)),
            Value::Text(s) => quote_string_single(s),
            Value::Blob(b) => format!("TO_BINARY('{}', 'HEX')", hex_upper(b)),
            Value::Boolean(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for Value {
    fn from(v: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map(Value::Text).unwrap_or(Value::Null)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(i.to_string()))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Wire format for the warehouse worker.
///
/// Scalars map to their JSON counterparts. Non-finite floats are sent as the
/// strings Snowflake accepts (`NaN`, `inf`, `-inf`). Blobs are sent as
/// `{"$binary": "<base64>"}`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Real(f) => serializer.serialize_str(float_keyword(*f)),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Blob(b) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    "$binary",
                    &base64::engine::general_purpose::STANDARD.encode(b),
                )?;
                map.end()
            }
        }
    }
}

fn float_keyword(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
