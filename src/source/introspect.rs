//! SQLite schema introspection and row streaming.
//!
//! Files are opened read-only after a header check. Tables come from
//! `sqlite_master` (internal `sqlite_*` tables excluded), columns from
//! `pragma_table_info` and foreign keys from `pragma_foreign_key_list`.
//! Declared column types are passed through verbatim.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Rows, Statement};
use tracing::{debug, warn};

use super::{domain, DatabaseFile, SourceReadError, SourceResult};
use crate::metadata::{Column, ForeignKeyEdge, SourceDatabase, TableSchema};
use crate::sql::helpers::quote_double;
use crate::sql::{Row, Value};

/// First 16 bytes of every SQLite 3 database file.
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

const LIST_TABLES: &str = r"SELECT name FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
ORDER BY name";

const TABLE_INFO: &str = r#"SELECT cid, name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#;

const FOREIGN_KEY_LIST: &str =
    r#"SELECT id, seq, "table", "from", "to" FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#;

/// A database file with everything introspection learned about it.
#[derive(Debug, Clone)]
pub struct Introspection {
    pub database: SourceDatabase,
    pub tables: Vec<TableSchema>,
}

/// Open a source file read-only, rejecting files that are not SQLite 3
/// databases.
pub fn open_read_only(path: &Path) -> SourceResult<Connection> {
    check_header(path)?;
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| SourceReadError::sqlite(path, e))
}

fn check_header(path: &Path) -> SourceResult<()> {
    let mut file = File::open(path).map_err(|e| SourceReadError::io(path, e))?;
    let mut header = [0u8; 16];
    match file.read_exact(&mut header) {
        Ok(()) if &header == SQLITE_HEADER => Ok(()),
        Ok(()) => Err(SourceReadError::NotADatabase(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(SourceReadError::NotADatabase(path.to_path_buf()))
        }
        Err(e) => Err(SourceReadError::io(path, e)),
    }
}

/// Read the full schema of a database file, tables sorted by name.
pub fn introspect(path: &Path, db_id: &str) -> SourceResult<Vec<TableSchema>> {
    let conn = open_read_only(path)?;
    read_schema(&conn, db_id).map_err(|e| SourceReadError::sqlite(path, e))
}

/// Introspect a discovered file and describe the database itself.
pub fn inspect(file: &DatabaseFile) -> SourceResult<Introspection> {
    let tables = introspect(&file.path, &file.id)?;
    let size_bytes = std::fs::metadata(&file.path)
        .map_err(|e| SourceReadError::io(&file.path, e))?
        .len();

    let table_names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    let column_names: Vec<&str> = tables
        .iter()
        .flat_map(|t| t.columns.iter().map(|c| c.name.as_str()))
        .collect();
    let domain = domain::classify(&file.id, &table_names, &column_names);

    debug!(
        db_id = %file.id,
        tables = tables.len(),
        domain,
        "introspected database"
    );

    Ok(Introspection {
        database: SourceDatabase {
            id: file.id.clone(),
            name: file.id.clone(),
            domain: domain.to_string(),
            path: file.path.clone(),
            size_bytes,
        },
        tables,
    })
}

fn read_schema(conn: &Connection, db_id: &str) -> rusqlite::Result<Vec<TableSchema>> {
    let names: Vec<String> = conn
        .prepare(LIST_TABLES)?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    names
        .into_iter()
        .map(|name| read_table(conn, db_id, name))
        .collect()
}

fn read_table(conn: &Connection, db_id: &str, name: String) -> rusqlite::Result<TableSchema> {
    let mut columns = Vec::new();
    let mut pk: Vec<(i64, String)> = Vec::new();

    let mut stmt = conn.prepare(TABLE_INFO)?;
    let mut rows = stmt.query([&name])?;
    while let Some(row) = rows.next()? {
        let cid: i64 = row.get(0)?;
        let column: String = row.get(1)?;
        let declared_type: Option<String> = row.get(2)?;
        let not_null: bool = row.get(3)?;
        let pk_position: i64 = row.get(4)?;

        if pk_position > 0 {
            pk.push((pk_position, column.clone()));
        }
        columns.push(Column {
            name: column,
            declared_type: declared_type.unwrap_or_default(),
            nullable: !not_null,
            position: cid as u32,
        });
    }
    pk.sort_by_key(|(position, _)| *position);

    let mut foreign_keys = Vec::new();
    let mut stmt = conn.prepare(FOREIGN_KEY_LIST)?;
    let mut rows = stmt.query([&name])?;
    while let Some(row) = rows.next()? {
        let referenced_table: String = row.get(2)?;
        let column: String = row.get(3)?;
        let referenced_column: Option<String> = row.get(4)?;
        foreign_keys.push(ForeignKeyEdge {
            db_id: db_id.to_string(),
            table: name.clone(),
            column,
            referenced_table,
            referenced_column,
        });
    }

    let row_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_double(&name)),
        [],
        |row| row.get(0),
    )?;

    Ok(TableSchema {
        db_id: db_id.to_string(),
        name,
        columns,
        primary_key: pk.into_iter().map(|(_, c)| c).collect(),
        foreign_keys,
        row_count: row_count.max(0) as u64,
    })
}

/// Prepare a full scan of `table` with columns in schema order.
pub fn select_all<'conn>(
    conn: &'conn Connection,
    table: &TableSchema,
) -> rusqlite::Result<Statement<'conn>> {
    let mut columns: Vec<_> = table.columns.iter().collect();
    columns.sort_by_key(|c| c.position);
    let list: Vec<String> = columns.iter().map(|c| quote_double(&c.name)).collect();
    conn.prepare(&format!(
        "SELECT {} FROM {}",
        list.join(", "),
        quote_double(&table.name)
    ))
}

/// Batched reader over a running table scan.
///
/// ```ignore
/// let conn = open_read_only(&path)?;
/// let mut stmt = select_all(&conn, &table)?;
/// let mut reader = TableReader::new(stmt.query([])?, table.columns.len());
/// while let Some(batch) = reader.next_batch(10_000)? {
///     sink.batch_insert(&name, &columns, &batch).await?;
/// }
/// ```
pub struct TableReader<'stmt> {
    rows: Rows<'stmt>,
    width: usize,
    offset: u64,
}

impl<'stmt> TableReader<'stmt> {
    pub fn new(rows: Rows<'stmt>, width: usize) -> Self {
        Self {
            rows,
            width,
            offset: 0,
        }
    }

    /// Rows returned so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read up to `size` rows. Returns `None` once the scan is exhausted.
    ///
    /// Text cells that are not valid UTF-8 are loaded with U+FFFD in place of
    /// the bad bytes, and a warning is logged for each.
    pub fn next_batch(&mut self, size: usize) -> rusqlite::Result<Option<Vec<Row>>> {
        let mut batch = Vec::with_capacity(size.min(1024));
        while batch.len() < size {
            let Some(row) = self.rows.next()? else {
                break;
            };
            let mut values = Vec::with_capacity(self.width);
            for idx in 0..self.width {
                let cell = row.get_ref(idx)?;
                if let ValueRef::Text(bytes) = cell {
                    if let Err(e) = std::str::from_utf8(bytes) {
                        warn!(
                            row_offset = self.offset + batch.len() as u64,
                            column = idx,
                            error = %e,
                            "invalid UTF-8 in text cell, loading with replacement characters"
                        );
                    }
                }
                values.push(Value::from(cell));
            }
            batch.push(values);
        }

        if batch.is_empty() {
            return Ok(None);
        }
        self.offset += batch.len() as u64;
        Ok(Some(batch))
    }
}
