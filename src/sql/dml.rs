//! DML (Data Manipulation Language) support.
//!
//! Multi-row INSERT rendering. The live warehouse sink ships rows as bound
//! values; this renderer is used when the run is written out as a SQL script.
//!
//! # Examples
//!
//! ```
//! use birdload::sql::dml::Insert;
//! use birdload::sql::Value;
//!
//! let insert = Insert::into("BIRD_QUESTIONS")
//!     .columns(["ID", "DB_ID"])
//!     .values(vec![Value::from("q1"), Value::from("card_games")]);
//!
//! assert_eq!(
//!     insert.to_sql(),
//!     r#"INSERT INTO "BIRD_QUESTIONS" ("ID", "DB_ID") VALUES ('q1', 'card_games')"#
//! );
//! ```

use super::helpers::quote_double;
use super::value::Row;

// ============================================================================
// INSERT
// ============================================================================

/// INSERT ... VALUES statement.
#[derive(Debug, Clone)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Row>,
}

impl Insert {
    /// Create a new INSERT statement.
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Set the columns to insert.
    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    /// Add a row of values.
    pub fn values(mut self, row: Row) -> Self {
        self.values.push(row);
        self
    }

    /// Add multiple rows of values.
    pub fn values_many(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.values.extend(rows);
        self
    }

    /// Convert to SQL.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("INSERT INTO ");
        sql.push_str(&quote_double(&self.table));

        if !self.columns.is_empty() {
            let cols: Vec<String> = self.columns.iter().map(|c| quote_double(c)).collect();
            sql.push_str(" (");
            sql.push_str(&cols.join(", "));
            sql.push(')');
        }

        sql.push_str(" VALUES ");
        let rows: Vec<String> = self
            .values
            .iter()
            .map(|row| {
                let vals: Vec<String> = row.iter().map(|v| v.to_sql_literal()).collect();
                format!("({})", vals.join(", "))
            })
            .collect();
        sql.push_str(&rows.join(", "));
        sql
    }
}
