//! Dry-run sink that writes every call as Snowflake SQL.

use std::io::Write;

use async_trait::async_trait;

use super::{SinkError, SinkResult, WarehouseSink};
use crate::sql::{Insert, Row};

/// Renders statements and batches to a writer, one statement per line.
///
/// Batches become multi-row `INSERT ... VALUES` statements. Running the
/// output against Snowflake reproduces the load.
pub struct ScriptSink<W: Write + Send> {
    out: W,
    statements: u64,
}

impl<W: Write + Send> ScriptSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, statements: 0 }
    }

    /// Statements written so far.
    pub fn statements(&self) -> u64 {
        self.statements
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_statement(&mut self, sql: &str) -> SinkResult<()> {
        writeln!(self.out, "{};", sql.trim_end())
            .map_err(|e| SinkError::Connection(format!("failed to write script: {e}")))?;
        self.statements += 1;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> WarehouseSink for ScriptSink<W> {
    async fn execute(&mut self, sql: &str) -> SinkResult<()> {
        self.write_statement(sql)
    }

    async fn batch_insert(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> SinkResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = Insert::into(table)
            .columns(columns.iter().cloned())
            .values_many(rows.iter().cloned())
            .to_sql();
        self.write_statement(&sql)?;
        Ok(rows.len() as u64)
    }

    async fn close(&mut self) -> SinkResult<()> {
        self.out
            .flush()
            .map_err(|e| SinkError::Connection(format!("failed to flush script: {e}")))
    }
}
