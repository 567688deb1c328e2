//! Schema normalization into warehouse metadata records.
//!
//! Introspected schemas are unpivoted into one record per table column and
//! one record per foreign-key edge. Output is sorted (database id, table name,
//! column position) so that two runs over the same files produce identical
//! metadata.
//!
//! Foreign keys are checked against the introspected schema of the same
//! database. An edge pointing at a table or column that does not exist is
//! reported as a [`NormalizationError`] and dropped; the rest of the run is
//! unaffected.

use std::collections::BTreeMap;

use tracing::warn;

use super::types::{ForeignKeyEdge, SourceDatabase, TableSchema};

/// A foreign-key edge that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("{db_id}.{table}: foreign key column '{column}' does not exist")]
    UnknownSourceColumn {
        db_id: String,
        table: String,
        column: String,
    },

    #[error("{db_id}.{table}.{column}: referenced table '{referenced_table}' does not exist")]
    UnknownTable {
        db_id: String,
        table: String,
        column: String,
        referenced_table: String,
    },

    #[error(
        "{db_id}.{table}.{column}: referenced column '{referenced_table}.{referenced_column}' does not exist"
    )]
    UnknownColumn {
        db_id: String,
        table: String,
        column: String,
        referenced_table: String,
        referenced_column: String,
    },

    #[error(
        "{db_id}.{table}.{column}: '{referenced_table}' has no single-column primary key to reference"
    )]
    NoPrimaryKey {
        db_id: String,
        table: String,
        column: String,
        referenced_table: String,
    },
}

/// Row of `BIRD_DATABASES`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRecord {
    pub db_id: String,
    pub db_name: String,
    pub domain: String,
    pub num_tables: u64,
    pub description: String,
    pub size_mb: f64,
    pub sqlite_path: String,
}

/// Row of `BIRD_TABLE_SCHEMAS`: one per table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRecord {
    pub id: String,
    pub db_id: String,
    pub table_name: String,
    pub column_name: String,
    pub column_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
    pub column_position: u32,
}

/// Row of `BIRD_FOREIGN_KEYS`: one per resolved edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRecord {
    pub id: String,
    pub db_id: String,
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

/// A table the transfer engine is expected to load.
///
/// Combined with the table's [`TableLoadStatus`](super::TableLoadStatus) once
/// the transfer attempt finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlaceholder {
    pub db_id: String,
    pub table_name: String,
    pub warehouse_table: String,
    pub source_row_count: u64,
}

impl From<&TableSchema> for LoadPlaceholder {
    fn from(table: &TableSchema) -> Self {
        Self {
            db_id: table.db_id.clone(),
            table_name: table.name.clone(),
            warehouse_table: table.warehouse_name(),
            source_row_count: table.row_count,
        }
    }
}

/// Everything the normalizer produces for one run.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMetadata {
    pub databases: Vec<DatabaseRecord>,
    pub columns: Vec<ColumnRecord>,
    pub foreign_keys: Vec<ForeignKeyRecord>,
    pub load_placeholders: Vec<LoadPlaceholder>,
    /// Edges that were dropped.
    pub errors: Vec<NormalizationError>,
}

/// Normalize all introspected schemas of a run.
///
/// `schemas` may contain tables of databases not listed in `databases`; they
/// are normalized all the same.
pub fn normalize(databases: &[SourceDatabase], schemas: &[TableSchema]) -> NormalizedMetadata {
    let mut out = NormalizedMetadata::default();

    // db_id -> table name -> schema, both ordered
    let mut by_db: BTreeMap<&str, BTreeMap<&str, &TableSchema>> = BTreeMap::new();
    for schema in schemas {
        by_db
            .entry(schema.db_id.as_str())
            .or_default()
            .insert(schema.name.as_str(), schema);
    }

    let mut sorted_dbs: Vec<&SourceDatabase> = databases.iter().collect();
    sorted_dbs.sort_by(|a, b| a.id.cmp(&b.id));

    for db in sorted_dbs {
        let num_tables = by_db.get(db.id.as_str()).map(|t| t.len()).unwrap_or(0);
        out.databases.push(DatabaseRecord {
            db_id: db.id.clone(),
            db_name: db.name.clone(),
            domain: db.domain.clone(),
            num_tables: num_tables as u64,
            description: format!("BIRD benchmark database: {}", db.id),
            size_mb: db.size_mb(),
            sqlite_path: db.path.display().to_string(),
        });
    }

    for (db_id, tables) in &by_db {
        for table in tables.values() {
            normalize_table(db_id, table, tables, &mut out);
        }
    }

    out
}

fn normalize_table(
    db_id: &str,
    table: &TableSchema,
    tables: &BTreeMap<&str, &TableSchema>,
    out: &mut NormalizedMetadata,
) {
    // Accepted edges keyed by source column position
    let mut resolved: BTreeMap<u32, Vec<ForeignKeyRecord>> = BTreeMap::new();

    for edge in &table.foreign_keys {
        match resolve_edge(db_id, table, edge, tables) {
            Ok((position, record)) => resolved.entry(position).or_default().push(record),
            Err(err) => {
                warn!(db_id, table = %table.name, error = %err, "dropping foreign key");
                out.errors.push(err);
            }
        }
    }

    let mut columns: Vec<_> = table.columns.iter().collect();
    columns.sort_by_key(|c| c.position);

    for column in columns {
        let first_fk = resolved.get(&column.position).and_then(|fks| fks.first());
        out.columns.push(ColumnRecord {
            id: format!("{}.{}.{}", db_id, table.name, column.name),
            db_id: db_id.to_string(),
            table_name: table.name.clone(),
            column_name: column.name.clone(),
            column_type: column.declared_type.clone(),
            is_nullable: column.nullable,
            is_primary_key: table.is_primary_key(&column.name),
            is_foreign_key: first_fk.is_some(),
            foreign_table: first_fk.map(|fk| fk.target_table.clone()),
            foreign_column: first_fk.map(|fk| fk.target_column.clone()),
            column_position: column.position,
        });
    }

    out.foreign_keys.extend(resolved.into_values().flatten());

    out.load_placeholders.push(LoadPlaceholder::from(table));
}

/// Resolve an edge against the database's tables. Names are matched
/// case-insensitively and the record carries the introspected spelling.
fn resolve_edge(
    db_id: &str,
    table: &TableSchema,
    edge: &ForeignKeyEdge,
    tables: &BTreeMap<&str, &TableSchema>,
) -> Result<(u32, ForeignKeyRecord), NormalizationError> {
    let source = table
        .column(&edge.column)
        .ok_or_else(|| NormalizationError::UnknownSourceColumn {
            db_id: db_id.to_string(),
            table: table.name.clone(),
            column: edge.column.clone(),
        })?;

    let target = tables
        .values()
        .find(|t| t.name.eq_ignore_ascii_case(&edge.referenced_table))
        .ok_or_else(|| NormalizationError::UnknownTable {
            db_id: db_id.to_string(),
            table: table.name.clone(),
            column: source.name.clone(),
            referenced_table: edge.referenced_table.clone(),
        })?;

    let target_column = match &edge.referenced_column {
        Some(name) => target
            .column(name)
            .map(|c| c.name.clone())
            .ok_or_else(|| NormalizationError::UnknownColumn {
                db_id: db_id.to_string(),
                table: table.name.clone(),
                column: source.name.clone(),
                referenced_table: target.name.clone(),
                referenced_column: name.clone(),
            })?,
        None => match target.primary_key.as_slice() {
            [pk] => pk.clone(),
            _ => {
                return Err(NormalizationError::NoPrimaryKey {
                    db_id: db_id.to_string(),
                    table: table.name.clone(),
                    column: source.name.clone(),
                    referenced_table: target.name.clone(),
                })
            }
        },
    };

    let record = ForeignKeyRecord {
        id: format!(
            "{}.{}.{}->{}.{}",
            db_id, table.name, source.name, target.name, target_column
        ),
        db_id: db_id.to_string(),
        source_table: table.name.clone(),
        source_column: source.name.clone(),
        target_table: target.name.clone(),
        target_column,
    };

    Ok((source.position, record))
}
