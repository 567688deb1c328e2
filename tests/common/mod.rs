//! Shared fixtures for integration tests: an in-memory warehouse sink and
//! small BIRD-like SQLite databases.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use birdload::config::Settings;
use birdload::warehouse::SinkResult;
use birdload::{Row, SinkError, Value, WarehouseSink};
use rusqlite::Connection;

/// Rows stored for one warehouse table.
#[derive(Debug, Default, Clone)]
pub struct StoredTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// A failure injected into the `n`th batch insert (1-based) of a table.
#[derive(Debug, Clone)]
struct InjectedFailure {
    table: String,
    batch: usize,
    error: SinkError,
}

/// Fake warehouse that keeps tables in memory.
///
/// `CREATE OR REPLACE TABLE` empties a table, plain `CREATE TABLE` fails when
/// the table already exists. Injected failures fire once.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub statements: Vec<String>,
    pub tables: BTreeMap<String, StoredTable>,
    pub closed: bool,
    batches: HashMap<String, usize>,
    failures: Vec<InjectedFailure>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail batch number `batch` (1-based, counted across runs) of `table`.
    pub fn fail_batch(mut self, table: &str, batch: usize, error: SinkError) -> Self {
        self.failures.push(InjectedFailure {
            table: table.to_string(),
            batch,
            error,
        });
        self
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
    }

    /// Text values of `column` across all rows of `table`.
    pub fn text_column(&self, table: &str, column: &str) -> Vec<String> {
        let Some(stored) = self.tables.get(table) else {
            return Vec::new();
        };
        let idx = stored
            .columns
            .iter()
            .position(|c| c == column)
            .unwrap_or_else(|| panic!("{table} has no column {column}"));
        stored
            .rows
            .iter()
            .map(|row| match &row[idx] {
                Value::Text(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_sql_literal(),
            })
            .collect()
    }

    /// Rows of `table` as column-name keyed maps.
    pub fn records(&self, table: &str) -> Vec<HashMap<String, Value>> {
        let Some(stored) = self.tables.get(table) else {
            return Vec::new();
        };
        stored
            .rows
            .iter()
            .map(|row| stored.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    pub fn executed(&self, prefix: &str) -> Vec<&String> {
        self.statements.iter().filter(|s| s.starts_with(prefix)).collect()
    }
}

/// Table name from `CREATE [OR REPLACE] TABLE "NAME" (...)`.
fn created_table(sql: &str) -> Option<(String, bool)> {
    let replace = sql.starts_with("CREATE OR REPLACE TABLE ");
    let rest = sql
        .strip_prefix("CREATE OR REPLACE TABLE \"")
        .or_else(|| sql.strip_prefix("CREATE TABLE \""))?;
    let end = rest.find('"')?;
    Some((rest[..end].to_string(), replace))
}

#[async_trait]
impl WarehouseSink for MemorySink {
    async fn execute(&mut self, sql: &str) -> SinkResult<()> {
        self.statements.push(sql.to_string());
        if let Some((name, replace)) = created_table(sql) {
            if !replace && self.tables.contains_key(&name) {
                return Err(SinkError::Permanent(format!(
                    "Object '{name}' already exists."
                )));
            }
            self.tables.insert(name, StoredTable::default());
        }
        Ok(())
    }

    async fn batch_insert(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> SinkResult<u64> {
        let batch = self.batches.entry(table.to_string()).or_default();
        *batch += 1;
        let batch = *batch;

        if let Some(pos) = self
            .failures
            .iter()
            .position(|f| f.table == table && f.batch == batch)
        {
            return Err(self.failures.remove(pos).error);
        }

        let stored = self
            .tables
            .get_mut(table)
            .ok_or_else(|| SinkError::Permanent(format!("Table '{table}' does not exist")))?;
        stored.columns = columns.to_vec();
        stored.rows.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn close(&mut self) -> SinkResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Create `<dir>/<db_id>/<db_id>.sqlite` from a SQL script.
pub fn sqlite_db(dir: &Path, db_id: &str, script: &str) -> PathBuf {
    let db_dir = dir.join(db_id);
    fs::create_dir_all(&db_dir).unwrap();
    let path = db_dir.join(format!("{db_id}.sqlite"));
    let conn = Connection::open(&path).unwrap();
    // BIRD files carry dangling references; the bundled SQLite enforces them.
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    conn.execute_batch(script).unwrap();
    path
}

/// `card_games`: 25 cards, 3 rulings, and a legalities table whose foreign
/// key points at a table that does not exist.
pub fn card_games(dir: &Path) -> PathBuf {
    let mut script = String::from(
        "CREATE TABLE cards (id INTEGER PRIMARY KEY, name TEXT, cost REAL);
         CREATE TABLE rulings (
             id INTEGER PRIMARY KEY,
             card_id INTEGER REFERENCES cards(id),
             text TEXT
         );
         CREATE TABLE legalities (
             id INTEGER PRIMARY KEY,
             set_code TEXT REFERENCES sets(code),
             format TEXT
         );
         INSERT INTO rulings VALUES (1, 1, 'First ruling'), (2, 1, NULL), (3, 2, 'Third');
         INSERT INTO legalities VALUES (1, 'M10', 'legacy');",
    );
    for i in 1..=25 {
        script.push_str(&format!(
            "INSERT INTO cards VALUES ({i}, 'Card {i}', {}.5);",
            i % 7
        ));
    }
    sqlite_db(dir, "card_games", &script)
}

/// `superhero`: two related tables with a handful of rows.
pub fn superhero(dir: &Path) -> PathBuf {
    sqlite_db(
        dir,
        "superhero",
        "CREATE TABLE publisher (id INTEGER PRIMARY KEY, publisher_name TEXT);
         CREATE TABLE superhero (
             id INTEGER PRIMARY KEY,
             superhero_name TEXT,
             publisher_id INTEGER REFERENCES publisher(id),
             height_cm INTEGER
         );
         INSERT INTO publisher VALUES (1, 'Marvel Comics'), (2, 'DC Comics');
         INSERT INTO superhero VALUES
             (1, 'Spider-Man', 1, 178),
             (2, 'Batman', 2, 188),
             (3, 'Storm', 1, NULL);",
    )
}

/// Settings pointing at `data_dir` with small batches and fast retries.
pub fn settings(data_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.source.data_dir = data_dir.to_string_lossy().into_owned();
    settings.load.batch_size = 10;
    settings.retry.initial_backoff_ms = 1;
    settings
}
