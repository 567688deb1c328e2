//! Introspected schema types.
//!
//! These are the Rust-native records produced by the schema introspector and
//! consumed by the normalizer and the transfer engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sql::helpers::warehouse_table_name;

/// One discovered source database file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDatabase {
    /// Database identifier (file stem, e.g. `card_games`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Domain label (e.g. `financial`, `general`).
    pub domain: String,
    /// Path to the database file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
}

impl SourceDatabase {
    /// File size in megabytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// A column of a source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as declared.
    pub name: String,
    /// Declared type, verbatim (may be empty).
    pub declared_type: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Ordinal position (0-based, declaration order).
    pub position: u32,
}

/// A foreign key edge as declared in the source schema.
///
/// `referenced_column` is `None` when the constraint names only the table,
/// which in SQLite means "the referenced table's primary key".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub db_id: String,
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: Option<String>,
}

/// Complete schema of one source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Owning database id.
    pub db_id: String,
    /// Table name as declared.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Primary key columns in key order.
    pub primary_key: Vec<String>,
    /// Declared foreign keys.
    pub foreign_keys: Vec<ForeignKeyEdge>,
    /// Number of rows at introspection time.
    pub row_count: u64,
}

impl TableSchema {
    /// Find a column by name, case-insensitively (SQLite semantics).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether a column is part of the primary key.
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key
            .iter()
            .any(|pk| pk.eq_ignore_ascii_case(column))
    }

    /// Name of the generated warehouse table.
    pub fn warehouse_name(&self) -> String {
        warehouse_table_name(&self.db_id, &self.name)
    }
}

/// Outcome of one table transfer. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLoadStatus {
    pub db_id: String,
    pub table_name: String,
    pub warehouse_table: String,
    /// Rows committed to the warehouse.
    pub row_count: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl TableLoadStatus {
    pub fn succeeded(table: &TableSchema, row_count: u64) -> Self {
        Self {
            db_id: table.db_id.clone(),
            table_name: table.name.clone(),
            warehouse_table: table.warehouse_name(),
            row_count,
            success: true,
            error: None,
        }
    }

    pub fn failed(table: &TableSchema, row_count: u64, error: impl Into<String>) -> Self {
        Self {
            db_id: table.db_id.clone(),
            table_name: table.name.clone(),
            warehouse_table: table.warehouse_name(),
            row_count,
            success: false,
            error: Some(error.into()),
        }
    }
}
