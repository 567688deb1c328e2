//! DDL (Data Definition Language) support.
//!
//! Builders for the statements the loader issues against Snowflake:
//! CREATE TABLE (optionally OR REPLACE) and CREATE VIEW.
//!
//! # Examples
//!
//! ```
//! use birdload::sql::ddl::{ColumnDef, CreateTable};
//! use birdload::sql::types::WarehouseType;
//!
//! let table = CreateTable::new("BIRD_CARD_GAMES_CARDS")
//!     .or_replace()
//!     .column(ColumnDef::new("ID", WarehouseType::BigInt).not_null())
//!     .column(ColumnDef::new("NAME", WarehouseType::Varchar));
//!
//! assert_eq!(
//!     table.to_sql(),
//!     r#"CREATE OR REPLACE TABLE "BIRD_CARD_GAMES_CARDS" ("ID" BIGINT NOT NULL, "NAME" VARCHAR)"#
//! );
//! ```

use super::helpers::quote_double;
use super::types::WarehouseType;

// ============================================================================
// CREATE TABLE
// ============================================================================

/// CREATE TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    pub or_replace: bool,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
}

impl CreateTable {
    /// Create a new CREATE TABLE statement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            or_replace: false,
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Emit CREATE OR REPLACE, dropping any existing table of the same name.
    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    /// Add a column definition.
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Add multiple column definitions.
    pub fn columns(mut self, cols: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.columns.extend(cols);
        self
    }

    /// Declare a (composite) primary key. Snowflake records but does not
    /// enforce it on standard tables.
    pub fn primary_key(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.primary_key = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Convert to SQL.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("CREATE ");
        if self.or_replace {
            sql.push_str("OR REPLACE ");
        }
        sql.push_str("TABLE ");
        sql.push_str(&quote_double(&self.name));
        sql.push_str(" (");

        let mut parts: Vec<String> = self.columns.iter().map(ColumnDef::to_sql).collect();
        if !self.primary_key.is_empty() {
            let cols: Vec<String> = self.primary_key.iter().map(|c| quote_double(c)).collect();
            parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }

        sql.push_str(&parts.join(", "));
        sql.push(')');
        sql
    }
}

// ============================================================================
// Column Definition
// ============================================================================

/// Column definition for CREATE TABLE.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: WarehouseType,
    pub nullable: Option<bool>,
    /// Raw SQL default expression.
    pub default: Option<String>,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: WarehouseType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: None,
            default: None,
        }
    }

    /// Mark column as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    /// Set a default expression (emitted verbatim).
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_double(&self.name), self.data_type.as_sql());
        if let Some(ref default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if self.nullable == Some(false) {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

// ============================================================================
// CREATE VIEW
// ============================================================================

/// CREATE VIEW statement over a raw SELECT.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateView {
    pub or_replace: bool,
    pub name: String,
    pub query: String,
}

impl CreateView {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            or_replace: false,
            name: name.into(),
            query: query.into(),
        }
    }

    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    pub fn to_sql(&self) -> String {
        let or_replace = if self.or_replace { "OR REPLACE " } else { "" };
        format!(
            "CREATE {}VIEW {} AS {}",
            or_replace,
            quote_double(&self.name),
            self.query.trim()
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
