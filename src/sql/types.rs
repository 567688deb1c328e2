//! Warehouse column types and the source-to-warehouse type mapping.
//!
//! SQLite column types are free-form strings (`VARCHAR(50)`, `INTEGER`,
//! `decimal(15,2)`, or nothing at all). The warehouse needs a concrete type
//! for every column, so the mapping here is total: every declared type maps to
//! exactly one [`WarehouseType`], falling back to `VARCHAR`.
//!
//! The rules are an ordered table, checked top to bottom against the
//! uppercased declared type. The order follows SQLite's own affinity rules
//! (`INT` wins over `CHAR`, so `POINT` is an integer column in SQLite too).
//!
//! # Examples
//!
//! ```
//! use birdload::sql::types::{map_source_type, WarehouseType};
//!
//! assert_eq!(map_source_type("INTEGER"), WarehouseType::BigInt);
//! assert_eq!(map_source_type("varchar(50)"), WarehouseType::Varchar);
//! assert_eq!(map_source_type("REAL"), WarehouseType::Double);
//! assert_eq!(map_source_type(""), WarehouseType::Varchar);
//! ```

use std::fmt;

/// Snowflake column type used in generated DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseType {
    /// 64-bit signed integer.
    BigInt,

    /// Double-precision floating point.
    Double,

    /// Variable-length text, unbounded.
    Varchar,

    /// Binary data.
    Binary,

    /// Boolean (metadata tables only).
    Boolean,

    /// Timestamp without timezone (metadata tables only).
    TimestampNtz,
}

impl WarehouseType {
    /// Snowflake spelling of this type.
    pub fn as_sql(&self) -> &'static str {
        match self {
            WarehouseType::BigInt => "BIGINT",
            WarehouseType::Double => "DOUBLE",
            WarehouseType::Varchar => "VARCHAR",
            WarehouseType::Binary => "BINARY",
            WarehouseType::Boolean => "BOOLEAN",
            WarehouseType::TimestampNtz => "TIMESTAMP_NTZ",
        }
    }
}

impl fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single mapping rule: if the uppercased declared type contains any of
/// the fragments, the column maps to the given warehouse type.
#[derive(Debug, Clone, Copy)]
pub struct TypeRule {
    pub fragments: &'static [&'static str],
    pub target: WarehouseType,
}

/// Ordered source type rules. First match wins.
pub const TYPE_RULES: &[TypeRule] = &[
    TypeRule {
        fragments: &["INT"],
        target: WarehouseType::BigInt,
    },
    TypeRule {
        fragments: &["CHAR", "CLOB", "TEXT"],
        target: WarehouseType::Varchar,
    },
    TypeRule {
        fragments: &["BLOB"],
        target: WarehouseType::Binary,
    },
    TypeRule {
        fragments: &["REAL", "FLOA", "DOUB", "NUMERIC", "DECIMAL"],
        target: WarehouseType::Double,
    },
];

/// Type used when no rule matches.
pub const FALLBACK_TYPE: WarehouseType = WarehouseType::Varchar;

/// Map a declared source column type to its warehouse type.
pub fn map_source_type(declared: &str) -> WarehouseType {
    let upper = declared.trim().to_uppercase();
    TYPE_RULES
        .iter()
        .find(|rule| rule.fragments.iter().any(|f| upper.contains(f)))
        .map(|rule| rule.target)
        .unwrap_or(FALLBACK_TYPE)
}
