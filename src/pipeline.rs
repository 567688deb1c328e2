//! One load run, start to finish.
//!
//! Order of operations:
//!
//! 1. acquire the warehouse session
//! 2. create the metadata tables
//! 3. discover and introspect the source databases
//! 4. normalize and load the metadata rows
//! 5. transfer every table
//! 6. map and load the question corpus
//! 7. create the summary views
//! 8. release the session
//!
//! A sink connection error at any step ends the run; the session is released
//! either way.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{Settings, SettingsError};
use crate::metadata::tables::load_records;
use crate::metadata::{
    metadata_table_definitions, normalize, summary_views, LoadPlaceholder, MetadataRecord,
    SourceDatabase, TableLoadStatus, TableSchema,
};
use crate::questions::load_questions;
use crate::source::{discover, inspect, SourceReadError};
use crate::transfer::{transfer_database, TableTargets, TransferOptions};
use crate::warehouse::{RetryPolicy, Session, SinkError, SinkResult, WarehouseSink};

/// Why a run stopped early.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("invalid source settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("cannot read data directory: {0}")]
    Discovery(#[from] SourceReadError),
}

/// A database that could not be loaded at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDatabase {
    pub db_id: String,
    pub error: String,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Databases found in the data directory.
    pub databases: usize,
    pub failed_databases: Vec<FailedDatabase>,
    /// One status per attempted table, in load order.
    pub tables: Vec<TableLoadStatus>,
    /// Tables left out by `max_tables`.
    pub skipped_tables: usize,
    pub normalization_errors: usize,
    /// Metadata inserts that failed (rows missing from the metadata tables).
    pub metadata_failures: usize,
    pub questions_loaded: u64,
    pub questions_skipped: usize,
    /// Set when a corpus is configured but could not be read.
    pub corpus_error: Option<String>,
    pub views_created: usize,
    pub views_failed: usize,
    /// Transient sink errors that were retried.
    pub retries: u64,
    pub fatal: Option<RunError>,
}

impl RunReport {
    pub fn loaded_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.success).count()
    }

    pub fn failed_tables(&self) -> usize {
        self.tables.len() - self.loaded_tables()
    }

    /// Rows committed across all data tables.
    pub fn rows_loaded(&self) -> u64 {
        self.tables.iter().map(|t| t.row_count).sum()
    }

    /// Failed tables alone do not fail a run. Missing metadata rows do.
    pub fn is_success(&self) -> bool {
        self.fatal.is_none()
            && self.failed_databases.is_empty()
            && self.corpus_error.is_none()
            && self.metadata_failures == 0
    }

    /// Process exit status.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    fn log_summary(&self) {
        info!(
            databases = self.databases,
            failed_databases = self.failed_databases.len(),
            tables_loaded = self.loaded_tables(),
            tables_failed = self.failed_tables(),
            tables_skipped = self.skipped_tables,
            metadata_failures = self.metadata_failures,
            rows = self.rows_loaded(),
            questions = self.questions_loaded,
            retries = self.retries,
            "run complete"
        );
        for db in &self.failed_databases {
            warn!(db_id = %db.db_id, error = %db.error, "database not loaded");
        }
        for table in self.tables.iter().filter(|t| !t.success) {
            warn!(
                db_id = %table.db_id,
                table = %table.table_name,
                rows = table.row_count,
                error = table.error.as_deref().unwrap_or_default(),
                "table not loaded"
            );
        }
    }
}

/// Run a full load into `sink`.
///
/// Returns the sink after its session has been released, along with the run
/// report.
pub async fn run<S: WarehouseSink>(sink: S, settings: &Settings) -> (S, RunReport) {
    let mut session = Session::new(sink, RetryPolicy::from(&settings.retry));
    let mut report = RunReport::default();

    if let Err(e) = load(&mut session, settings, &mut report).await {
        error!(error = %e, "run aborted");
        report.fatal = Some(e);
    }
    report.retries = session.retries();

    let (sink, closed) = session.close().await;
    if let Err(e) = closed {
        if report.fatal.is_none() {
            report.fatal = Some(e.into());
        }
    }

    report.log_summary();
    (sink, report)
}

async fn load<S: WarehouseSink>(
    session: &mut Session<S>,
    settings: &Settings,
    report: &mut RunReport,
) -> Result<(), RunError> {
    for table in metadata_table_definitions() {
        session.execute(&table.to_sql()).await?;
    }

    let data_dir = settings.source.resolved_data_dir()?;
    let files = discover(&data_dir)?;
    report.databases = files.len();
    info!(data_dir = %data_dir.display(), databases = files.len(), "discovered databases");

    let mut databases = Vec::new();
    let mut schemas: Vec<Vec<TableSchema>> = Vec::new();
    for file in &files {
        match inspect(file) {
            Ok(found) => {
                info!(
                    db_id = %found.database.id,
                    domain = %found.database.domain,
                    tables = found.tables.len(),
                    "introspected database"
                );
                databases.push(found.database);
                schemas.push(found.tables);
            }
            Err(e) => {
                warn!(db_id = %file.id, error = %e, "skipping unreadable database");
                report.failed_databases.push(FailedDatabase {
                    db_id: file.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let all_tables: Vec<TableSchema> = schemas.iter().flatten().cloned().collect();
    let normalized = normalize(&databases, &all_tables);
    report.normalization_errors = normalized.errors.len();

    let batch_size = settings.load.batch_size;
    insert_metadata(session, &normalized.databases, batch_size, report).await?;
    insert_metadata(session, &normalized.columns, batch_size, report).await?;
    insert_metadata(session, &normalized.foreign_keys, batch_size, report).await?;

    let placeholders = normalized.load_placeholders;
    transfer_all(session, settings, &databases, &schemas, placeholders, report).await?;

    if let Some(path) = settings.source.resolved_questions()? {
        let domains: HashMap<String, String> = databases
            .iter()
            .map(|db| (db.id.clone(), db.domain.clone()))
            .collect();
        match load_questions(&path, &domains) {
            Ok(mapped) => {
                report.questions_skipped = mapped.skipped;
                let loaded =
                    insert_metadata(session, &mapped.questions, batch_size, report).await?;
                report.questions_loaded = loaded;
                info!(
                    questions = report.questions_loaded,
                    skipped = mapped.skipped,
                    "loaded question corpus"
                );
            }
            Err(e) => {
                error!(error = %e, "question corpus unreadable");
                report.corpus_error = Some(e.to_string());
            }
        }
    }

    if settings.load.create_views {
        for view in summary_views() {
            match session.execute(&view.to_sql()).await {
                Ok(()) => report.views_created += 1,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(view = %view.name, error = %e, "failed to create view");
                    report.views_failed += 1;
                }
            }
        }
    }

    Ok(())
}

async fn transfer_all<S: WarehouseSink>(
    session: &mut Session<S>,
    settings: &Settings,
    databases: &[SourceDatabase],
    schemas: &[Vec<TableSchema>],
    placeholders: Vec<LoadPlaceholder>,
    report: &mut RunReport,
) -> SinkResult<()> {
    let options = TransferOptions::from(&settings.load);
    let mut targets = TableTargets::new(placeholders);
    let mut budget = settings.load.table_limit();

    for (database, tables) in databases.iter().zip(schemas) {
        let take = budget.map_or(tables.len(), |left| left.min(tables.len()));
        if take < tables.len() {
            for table in &tables[take..] {
                info!(db_id = %table.db_id, table = %table.name, "table limit reached, skipping");
            }
            report.skipped_tables += tables.len() - take;
        }
        if let Some(left) = budget.as_mut() {
            *left -= take;
        }
        if take == 0 {
            continue;
        }

        let span = info_span!("database", db_id = %database.id);
        let statuses =
            transfer_database(session, database, &tables[..take], &mut targets, &options)
                .instrument(span)
                .await?;

        if statuses.iter().all(|s| !s.success) {
            let error = statuses
                .iter()
                .find_map(|s| s.error.clone())
                .unwrap_or_else(|| "no table loaded".to_string());
            report.failed_databases.push(FailedDatabase {
                db_id: database.id.clone(),
                error,
            });
        }
        report.tables.extend(statuses);
    }

    Ok(())
}

/// Insert metadata rows. A failed insert is logged and counted; only a
/// connection error is returned.
async fn insert_metadata<S, R>(
    session: &mut Session<S>,
    records: &[R],
    batch_size: usize,
    report: &mut RunReport,
) -> SinkResult<u64>
where
    S: WarehouseSink,
    R: MetadataRecord,
{
    match load_records(session, records, batch_size).await {
        Ok(rows) => Ok(rows),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(table = R::TABLE, error = %e, "failed to load metadata rows");
            report.metadata_failures += 1;
            Ok(0)
        }
    }
}
