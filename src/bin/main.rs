//! birdload CLI - Load the BIRD benchmark into Snowflake
//!
//! Usage:
//!   birdload load [--config <file>] [--data-dir <dir>] [--questions <file>] [--dry-run]
//!   birdload inspect <data-dir>
//!   birdload ddl <database-file>
//!
//! Examples:
//!   birdload load --data-dir ./dev_databases --questions ./dev.json
//!   birdload load --dry-run > load.sql
//!   birdload ddl ./dev_databases/card_games/card_games.sqlite

use birdload::config::{ExistingTablePolicy, Settings};
use birdload::source::{discover, inspect, DatabaseFile};
use birdload::transfer::create_table_statement;
use birdload::warehouse::{ScriptSink, WorkerSink};
use birdload::{RunReport, SinkError};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "birdload")]
#[command(about = "Load the BIRD text-to-SQL benchmark into a Snowflake warehouse")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full load
    Load {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the SQLite databases (overrides the config file)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Question corpus, JSON or JSON Lines (overrides the config file)
        #[arg(short, long)]
        questions: Option<PathBuf>,

        /// Write the SQL script to stdout instead of loading the warehouse
        #[arg(long)]
        dry_run: bool,
    },

    /// Introspect a data directory without touching the warehouse
    Inspect {
        /// Directory holding the SQLite databases
        data_dir: PathBuf,
    },

    /// Print the warehouse DDL for one database file
    Ddl {
        /// Path to the .sqlite file
        file: PathBuf,

        /// Emit plain CREATE TABLE instead of CREATE OR REPLACE
        #[arg(long)]
        no_replace: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            config,
            data_dir,
            questions,
            dry_run,
        } => cmd_load(config.as_deref(), data_dir, questions, dry_run),
        Commands::Inspect { data_dir } => cmd_inspect(&data_dir),
        Commands::Ddl { file, no_replace } => cmd_ddl(file, no_replace),
    }
}

fn cmd_load(
    config: Option<&Path>,
    data_dir: Option<PathBuf>,
    questions: Option<PathBuf>,
    dry_run: bool,
) -> ExitCode {
    let mut settings = match Settings::load(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = data_dir {
        settings.source.data_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(corpus) = questions {
        settings.source.questions = Some(corpus.to_string_lossy().into_owned());
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = runtime.block_on(async {
        if dry_run {
            let (_, report) = birdload::run(ScriptSink::new(io::stdout()), &settings).await;
            Ok::<_, SinkError>(report)
        } else {
            let sink = WorkerSink::connect(&settings).await?;
            let (_, report) = birdload::run(sink, &settings).await;
            Ok(report)
        }
    });

    match report {
        Ok(report) => finish(&report),
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn finish(report: &RunReport) -> ExitCode {
    eprintln!(
        "Loaded {}/{} tables ({} rows) from {} databases, {} questions",
        report.loaded_tables(),
        report.tables.len(),
        report.rows_loaded(),
        report.databases,
        report.questions_loaded
    );
    if let Some(e) = &report.fatal {
        eprintln!("Run aborted: {}", e);
    }
    if let Some(e) = &report.corpus_error {
        eprintln!("Question corpus error: {}", e);
    }
    for db in &report.failed_databases {
        eprintln!("Database {} failed: {}", db.db_id, db.error);
    }
    ExitCode::from(report.exit_code())
}

fn cmd_inspect(data_dir: &Path) -> ExitCode {
    let files = match discover(data_dir) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error reading '{}': {}", data_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("Data directory: {}", data_dir.display());
    println!("Databases: {}", files.len());
    println!();

    let mut failed = false;
    for file in &files {
        let found = match inspect(file) {
            Ok(found) => found,
            Err(e) => {
                println!("  - {} (error: {})", file.id, e);
                failed = true;
                continue;
            }
        };

        let db = &found.database;
        println!(
            "{} [{}] {:.2} MB, {} tables",
            db.id,
            db.domain,
            db.size_mb(),
            found.tables.len()
        );
        for table in &found.tables {
            println!(
                "  - {} ({} columns, {} foreign keys, {} rows)",
                table.name,
                table.columns.len(),
                table.foreign_keys.len(),
                table.row_count
            );
        }
        println!();
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_ddl(file: PathBuf, no_replace: bool) -> ExitCode {
    let found = match inspect(&DatabaseFile::from_path(file)) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let policy = if no_replace {
        ExistingTablePolicy::Fail
    } else {
        ExistingTablePolicy::Replace
    };

    println!("-- Database: {} ({})", found.database.id, found.database.domain);
    for table in &found.tables {
        println!("{};", create_table_statement(table, policy).to_sql());
    }
    ExitCode::SUCCESS
}
