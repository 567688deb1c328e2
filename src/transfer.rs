//! Data transfer engine.
//!
//! Copies every table of a source database into its own warehouse table:
//!
//! 1. derive the warehouse name (`BIRD_<DB>_<TABLE>`) and column names
//! 2. create the table with mapped column types
//! 3. stream rows from SQLite and insert them in fixed-size batches
//! 4. record a [`TableLoadStatus`] and append it to `BIRD_TABLE_DATA_INFO`
//!
//! A table that fails (create, insert, or source read) is recorded as failed
//! with the rows committed so far; the next table is attempted. Only a
//! [`SinkError::Connection`] ends the transfer early.
//!
//! Warehouse names are claimed once per run through [`TableTargets`]. A table
//! whose sanitized name is already taken (by another source table, a metadata
//! table, or a summary view) is recorded as failed and never created.

use std::collections::HashMap;

use rusqlite::Connection;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{ExistingTablePolicy, LoadSettings};
use crate::metadata::tables::load_records;
use crate::metadata::{
    metadata_table_definitions, summary_views, LoadPlaceholder, SourceDatabase, TableDataInfo,
    TableLoadStatus, TableSchema,
};
use crate::source::{open_read_only, select_all, TableReader};
use crate::sql::{map_source_type, warehouse_column_names, ColumnDef, CreateTable};
use crate::warehouse::{Session, SinkError, WarehouseSink};

/// Transfer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Rows per batch insert.
    pub batch_size: usize,
    pub existing_tables: ExistingTablePolicy,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from(&LoadSettings::default())
    }
}

impl From<&LoadSettings> for TransferOptions {
    fn from(settings: &LoadSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            existing_tables: settings.existing_tables,
        }
    }
}

/// Why a single table could not be transferred.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("create table failed: {0}")]
    Create(#[source] SinkError),

    #[error("batch insert failed at row {row_offset}: {source}")]
    Insert {
        row_offset: u64,
        #[source]
        source: SinkError,
    },

    #[error("source read failed at row {row_offset}: {source}")]
    Read {
        row_offset: u64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("source database unavailable: {0}")]
    SourceUnavailable(String),

    #[error("warehouse table {table} collides with {owner}")]
    NameCollision { table: String, owner: String },
}

impl TransferError {
    /// The sink error that has to end the run, if any.
    fn into_fatal(self) -> Result<Self, SinkError> {
        match self {
            TransferError::Create(e) | TransferError::Insert { source: e, .. } if e.is_fatal() => {
                Err(e)
            }
            other => Ok(other),
        }
    }
}

/// Warehouse tables claimed during a run, plus the load placeholders from
/// normalization.
#[derive(Debug, Clone)]
pub struct TableTargets {
    placeholders: HashMap<(String, String), LoadPlaceholder>,
    /// warehouse name -> what holds it
    claimed: HashMap<String, String>,
}

impl TableTargets {
    /// Start a run. Metadata tables and summary views are reserved up front.
    pub fn new(placeholders: impl IntoIterator<Item = LoadPlaceholder>) -> Self {
        let mut claimed = HashMap::new();
        for table in metadata_table_definitions() {
            let owner = format!("metadata table {}", table.name);
            claimed.insert(table.name, owner);
        }
        for view in summary_views() {
            let owner = format!("summary view {}", view.name);
            claimed.insert(view.name, owner);
        }

        let placeholders = placeholders
            .into_iter()
            .map(|p| ((p.db_id.clone(), p.table_name.clone()), p))
            .collect();
        Self {
            placeholders,
            claimed,
        }
    }

    /// Targets for tables that were not normalized beforehand.
    pub fn for_tables<'a>(tables: impl IntoIterator<Item = &'a TableSchema>) -> Self {
        Self::new(tables.into_iter().map(LoadPlaceholder::from))
    }

    /// Claim the warehouse table for `table`.
    ///
    /// Returns the placeholder either way; the error carries the current
    /// holder of the name.
    fn claim(&mut self, table: &TableSchema) -> (LoadPlaceholder, Result<(), TransferError>) {
        let placeholder = self
            .placeholders
            .remove(&(table.db_id.clone(), table.name.clone()))
            .unwrap_or_else(|| LoadPlaceholder::from(table));

        let result = match self.claimed.get(&placeholder.warehouse_table) {
            Some(owner) => Err(TransferError::NameCollision {
                table: placeholder.warehouse_table.clone(),
                owner: owner.clone(),
            }),
            None => {
                self.claimed.insert(
                    placeholder.warehouse_table.clone(),
                    format!("{}.{}", table.db_id, table.name),
                );
                Ok(())
            }
        };
        (placeholder, result)
    }
}

/// Warehouse DDL for a source table.
pub fn create_table_statement(table: &TableSchema, policy: ExistingTablePolicy) -> CreateTable {
    let mut columns: Vec<_> = table.columns.iter().collect();
    columns.sort_by_key(|c| c.position);

    let names = warehouse_column_names(columns.iter().map(|c| c.name.as_str()));
    let stmt = CreateTable::new(table.warehouse_name()).columns(
        names
            .into_iter()
            .zip(&columns)
            .map(|(name, col)| ColumnDef::new(name, map_source_type(&col.declared_type))),
    );

    match policy {
        ExistingTablePolicy::Replace => stmt.or_replace(),
        ExistingTablePolicy::Fail => stmt,
    }
}

/// Transfer all `tables` of one database.
///
/// Returns one status per table, in order. Each status is also appended to
/// `BIRD_TABLE_DATA_INFO` as soon as the table is done.
///
/// # Errors
///
/// Only a connection error from the sink; the remaining tables are not
/// attempted.
pub async fn transfer_database<S: WarehouseSink>(
    session: &mut Session<S>,
    database: &SourceDatabase,
    tables: &[TableSchema],
    targets: &mut TableTargets,
    options: &TransferOptions,
) -> Result<Vec<TableLoadStatus>, SinkError> {
    let conn = open_read_only(&database.path).map_err(|e| {
        warn!(db_id = %database.id, error = %e, "cannot open source database for transfer");
        e.to_string()
    });

    let mut statuses = Vec::with_capacity(tables.len());
    for table in tables {
        let span = info_span!("transfer", db_id = %table.db_id, table = %table.name);
        let (placeholder, claimed) = targets.claim(table);
        let status = match (&conn, claimed) {
            (_, Err(e)) => {
                span.in_scope(|| warn!(error = %e, "table not created"));
                TableLoadStatus::failed(table, 0, e.to_string())
            }
            (Ok(conn), Ok(())) => {
                transfer_table(session, conn, table, options)
                    .instrument(span.clone())
                    .await?
            }
            (Err(reason), Ok(())) => TableLoadStatus::failed(
                table,
                0,
                TransferError::SourceUnavailable(reason.clone()).to_string(),
            ),
        };
        record_status(session, &placeholder, &status).instrument(span).await?;
        statuses.push(status);
    }

    let loaded = statuses.iter().filter(|s| s.success).count();
    info!(
        db_id = %database.id,
        tables = statuses.len(),
        loaded,
        failed = statuses.len() - loaded,
        "database transferred"
    );
    Ok(statuses)
}

/// Transfer one table.
///
/// # Errors
///
/// Only a connection error from the sink. Every other failure is reported in
/// the returned status.
pub async fn transfer_table<S: WarehouseSink>(
    session: &mut Session<S>,
    conn: &Connection,
    table: &TableSchema,
    options: &TransferOptions,
) -> Result<TableLoadStatus, SinkError> {
    let mut committed = 0;
    match copy_table(session, conn, table, options, &mut committed).await {
        Ok(()) => {
            info!(rows = committed, source_rows = table.row_count, "table loaded");
            Ok(TableLoadStatus::succeeded(table, committed))
        }
        Err(e) => {
            let e = e.into_fatal()?;
            warn!(rows = committed, error = %e, "table failed");
            Ok(TableLoadStatus::failed(table, committed, e.to_string()))
        }
    }
}

async fn copy_table<S: WarehouseSink>(
    session: &mut Session<S>,
    conn: &Connection,
    table: &TableSchema,
    options: &TransferOptions,
    committed: &mut u64,
) -> Result<(), TransferError> {
    let ddl = create_table_statement(table, options.existing_tables);
    session
        .execute(&ddl.to_sql())
        .await
        .map_err(TransferError::Create)?;

    let target = ddl.name.clone();
    let columns = ddl.column_names();
    let read_error = |row_offset, source| TransferError::Read { row_offset, source };

    let mut stmt = select_all(conn, table).map_err(|e| read_error(0, e))?;
    let rows = stmt.query([]).map_err(|e| read_error(0, e))?;
    let mut reader = TableReader::new(rows, table.columns.len());

    loop {
        let row_offset = reader.offset();
        let batch = match reader.next_batch(options.batch_size) {
            Ok(Some(batch)) => batch,
            Ok(None) => break,
            Err(e) => return Err(read_error(row_offset, e)),
        };

        let inserted = session
            .batch_insert(&target, &columns, &batch)
            .await
            .map_err(|source| TransferError::Insert { row_offset, source })?;
        *committed += inserted;
        tracing::debug!(row_offset, rows = inserted, "batch inserted");
    }

    Ok(())
}

/// Append a status row to `BIRD_TABLE_DATA_INFO`.
async fn record_status<S: WarehouseSink>(
    session: &mut Session<S>,
    placeholder: &LoadPlaceholder,
    status: &TableLoadStatus,
) -> Result<(), SinkError> {
    let info = TableDataInfo::new(placeholder, status);
    match load_records(session, &[info], 1).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, "failed to record load status");
            Ok(())
        }
    }
}
