//! Warehouse metadata tables.
//!
//! Each metadata table is described once by a [`MetadataRecord`] impl: the
//! table definition and how one record becomes one row. Columns with a
//! default expression (`CREATED_AT`, `LOADED_AT`) are filled by the
//! warehouse and are left out of inserts.

use tracing::debug;

use crate::sql::{ColumnDef, CreateTable, Row, Value, WarehouseType};
use crate::warehouse::{Session, SinkResult, WarehouseSink};

use super::normalize::{ColumnRecord, DatabaseRecord, ForeignKeyRecord, LoadPlaceholder};
use super::types::TableLoadStatus;
use crate::questions::Question;

pub const DATABASES_TABLE: &str = "BIRD_DATABASES";
pub const TABLE_SCHEMAS_TABLE: &str = "BIRD_TABLE_SCHEMAS";
pub const FOREIGN_KEYS_TABLE: &str = "BIRD_FOREIGN_KEYS";
pub const QUESTIONS_TABLE: &str = "BIRD_QUESTIONS";
pub const TABLE_DATA_INFO_TABLE: &str = "BIRD_TABLE_DATA_INFO";

const CURRENT_TIMESTAMP: &str = "CURRENT_TIMESTAMP()";

/// A record that is stored as one row of a fixed metadata table.
pub trait MetadataRecord {
    /// Warehouse table name.
    const TABLE: &'static str;

    /// Full table definition, including defaulted columns.
    fn definition() -> CreateTable;

    /// Values for [`Self::insert_columns`], in the same order.
    fn to_row(&self) -> Row;

    /// Columns supplied by the loader.
    fn insert_columns() -> Vec<String> {
        Self::definition()
            .columns
            .into_iter()
            .filter(|c| c.default.is_none())
            .map(|c| c.name)
            .collect()
    }
}

/// CREATE OR REPLACE statements for every metadata table, in load order.
pub fn metadata_table_definitions() -> Vec<CreateTable> {
    vec![
        DatabaseRecord::definition(),
        ColumnRecord::definition(),
        ForeignKeyRecord::definition(),
        Question::definition(),
        TableDataInfo::definition(),
    ]
    .into_iter()
    .map(CreateTable::or_replace)
    .collect()
}

/// Insert records into their metadata table in batches of `batch_size`.
///
/// Returns the number of rows committed. Stops at the first failed batch.
pub async fn load_records<S, R>(
    session: &mut Session<S>,
    records: &[R],
    batch_size: usize,
) -> SinkResult<u64>
where
    S: WarehouseSink,
    R: MetadataRecord,
{
    let columns = R::insert_columns();
    let mut committed = 0;
    for chunk in records.chunks(batch_size.max(1)) {
        let rows: Vec<Row> = chunk.iter().map(MetadataRecord::to_row).collect();
        committed += session.batch_insert(R::TABLE, &columns, &rows).await?;
    }
    debug!(table = R::TABLE, rows = committed, "loaded metadata rows");
    Ok(committed)
}

fn varchar(name: &str) -> ColumnDef {
    ColumnDef::new(name, WarehouseType::Varchar)
}

fn opt_text(value: &Option<String>) -> Value {
    value.clone().into()
}

impl MetadataRecord for DatabaseRecord {
    const TABLE: &'static str = DATABASES_TABLE;

    fn definition() -> CreateTable {
        CreateTable::new(Self::TABLE)
            .column(varchar("DB_ID").not_null())
            .column(varchar("DB_NAME"))
            .column(varchar("DOMAIN"))
            .column(ColumnDef::new("NUM_TABLES", WarehouseType::BigInt))
            .column(varchar("DESCRIPTION"))
            .column(ColumnDef::new("SIZE_MB", WarehouseType::Double))
            .column(varchar("SQLITE_PATH"))
            .column(
                ColumnDef::new("CREATED_AT", WarehouseType::TimestampNtz)
                    .default_expr(CURRENT_TIMESTAMP),
            )
            .primary_key(["DB_ID"])
    }

    fn to_row(&self) -> Row {
        vec![
            self.db_id.as_str().into(),
            self.db_name.as_str().into(),
            self.domain.as_str().into(),
            self.num_tables.into(),
            self.description.as_str().into(),
            self.size_mb.into(),
            self.sqlite_path.as_str().into(),
        ]
    }
}

impl MetadataRecord for ColumnRecord {
    const TABLE: &'static str = TABLE_SCHEMAS_TABLE;

    fn definition() -> CreateTable {
        CreateTable::new(Self::TABLE)
            .column(varchar("ID").not_null())
            .column(varchar("DB_ID"))
            .column(varchar("TABLE_NAME"))
            .column(varchar("COLUMN_NAME"))
            .column(varchar("COLUMN_TYPE"))
            .column(ColumnDef::new("IS_NULLABLE", WarehouseType::Boolean))
            .column(ColumnDef::new("IS_PRIMARY_KEY", WarehouseType::Boolean))
            .column(ColumnDef::new("IS_FOREIGN_KEY", WarehouseType::Boolean))
            .column(varchar("FOREIGN_TABLE"))
            .column(varchar("FOREIGN_COLUMN"))
            .column(ColumnDef::new("COLUMN_POSITION", WarehouseType::BigInt))
            .primary_key(["ID"])
    }

    fn to_row(&self) -> Row {
        vec![
            self.id.as_str().into(),
            self.db_id.as_str().into(),
            self.table_name.as_str().into(),
            self.column_name.as_str().into(),
            self.column_type.as_str().into(),
            self.is_nullable.into(),
            self.is_primary_key.into(),
            self.is_foreign_key.into(),
            opt_text(&self.foreign_table),
            opt_text(&self.foreign_column),
            i64::from(self.column_position).into(),
        ]
    }
}

impl MetadataRecord for ForeignKeyRecord {
    const TABLE: &'static str = FOREIGN_KEYS_TABLE;

    fn definition() -> CreateTable {
        CreateTable::new(Self::TABLE)
            .column(varchar("ID").not_null())
            .column(varchar("DB_ID"))
            .column(varchar("SOURCE_TABLE"))
            .column(varchar("SOURCE_COLUMN"))
            .column(varchar("TARGET_TABLE"))
            .column(varchar("TARGET_COLUMN"))
            .primary_key(["ID"])
    }

    fn to_row(&self) -> Row {
        vec![
            self.id.as_str().into(),
            self.db_id.as_str().into(),
            self.source_table.as_str().into(),
            self.source_column.as_str().into(),
            self.target_table.as_str().into(),
            self.target_column.as_str().into(),
        ]
    }
}

impl MetadataRecord for Question {
    const TABLE: &'static str = QUESTIONS_TABLE;

    fn definition() -> CreateTable {
        CreateTable::new(Self::TABLE)
            .column(varchar("ID").not_null())
            .column(varchar("DB_ID"))
            .column(varchar("QUESTION"))
            .column(varchar("EVIDENCE"))
            .column(varchar("SQL_QUERY"))
            .column(varchar("DIFFICULTY"))
            .column(varchar("DOMAIN"))
            .column(varchar("QUESTION_ID_ORIGINAL"))
            .primary_key(["ID"])
    }

    fn to_row(&self) -> Row {
        vec![
            self.id.as_str().into(),
            self.db_id.as_str().into(),
            self.question.as_str().into(),
            opt_text(&self.evidence),
            self.sql.as_str().into(),
            self.difficulty.as_str().into(),
            self.domain.as_str().into(),
            opt_text(&self.original_id),
        ]
    }
}

/// Row of `BIRD_TABLE_DATA_INFO`: a load placeholder joined with the outcome
/// of its transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDataInfo {
    pub db_id: String,
    pub table_name: String,
    pub warehouse_table: String,
    pub source_row_count: u64,
    pub row_count: u64,
    pub data_loaded: bool,
    pub error_message: Option<String>,
}

impl TableDataInfo {
    pub fn new(placeholder: &LoadPlaceholder, status: &TableLoadStatus) -> Self {
        Self {
            db_id: placeholder.db_id.clone(),
            table_name: placeholder.table_name.clone(),
            warehouse_table: placeholder.warehouse_table.clone(),
            source_row_count: placeholder.source_row_count,
            row_count: status.row_count,
            data_loaded: status.success,
            error_message: status.error.clone(),
        }
    }
}

impl MetadataRecord for TableDataInfo {
    const TABLE: &'static str = TABLE_DATA_INFO_TABLE;

    fn definition() -> CreateTable {
        CreateTable::new(Self::TABLE)
            .column(varchar("DB_ID").not_null())
            .column(varchar("TABLE_NAME").not_null())
            .column(varchar("WAREHOUSE_TABLE_NAME"))
            .column(ColumnDef::new("SOURCE_ROW_COUNT", WarehouseType::BigInt))
            .column(ColumnDef::new("ROW_COUNT", WarehouseType::BigInt))
            .column(ColumnDef::new("DATA_LOADED", WarehouseType::Boolean))
            .column(varchar("ERROR_MESSAGE"))
            .column(
                ColumnDef::new("LOADED_AT", WarehouseType::TimestampNtz)
                    .default_expr(CURRENT_TIMESTAMP),
            )
    }

    fn to_row(&self) -> Row {
        vec![
            self.db_id.as_str().into(),
            self.table_name.as_str().into(),
            self.warehouse_table.as_str().into(),
            self.source_row_count.into(),
            self.row_count.into(),
            self.data_loaded.into(),
            opt_text(&self.error_message),
        ]
    }
}
