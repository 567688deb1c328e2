//! End-to-end runs against the in-memory warehouse.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;
use std::fs;

use birdload::metadata::tables::{
    DATABASES_TABLE, FOREIGN_KEYS_TABLE, QUESTIONS_TABLE, TABLE_DATA_INFO_TABLE,
    TABLE_SCHEMAS_TABLE,
};
use birdload::source::introspect;
use birdload::warehouse::ScriptSink;
use birdload::{run, SinkError, Value};
use common::{card_games, settings, sqlite_db, superhero, MemorySink};
use tempfile::TempDir;

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    card_games(dir.path());
    superhero(dir.path());
    dir
}

#[tokio::test]
async fn test_full_load() {
    let dir = data_dir();
    let (sink, report) = run(MemorySink::new(), &settings(dir.path())).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.exit_code(), 0);
    assert!(sink.closed);
    assert_eq!(report.databases, 2);
    assert_eq!(report.tables.len(), 5);
    assert_eq!(report.failed_tables(), 0);
    assert_eq!(report.views_created, 4);

    assert_eq!(sink.rows("BIRD_CARD_GAMES_CARDS").len(), 25);
    assert_eq!(sink.rows("BIRD_CARD_GAMES_RULINGS").len(), 3);
    assert_eq!(sink.rows("BIRD_SUPERHERO_SUPERHERO").len(), 3);
    assert_eq!(
        sink.text_column(DATABASES_TABLE, "DB_ID"),
        vec!["card_games", "superhero"]
    );

    let infos = sink.records(TABLE_DATA_INFO_TABLE);
    assert_eq!(infos.len(), 5);
    assert!(infos
        .iter()
        .all(|r| r["DATA_LOADED"] == Value::Boolean(true) && r["ERROR_MESSAGE"] == Value::Null));
}

#[tokio::test]
async fn test_table_schemas_match_introspection() {
    let dir = TempDir::new().unwrap();
    let cards_path = card_games(dir.path());
    let hero_path = superhero(dir.path());
    let (sink, _) = run(MemorySink::new(), &settings(dir.path())).await;

    let mut expected = BTreeSet::new();
    for (path, db_id) in [(&cards_path, "card_games"), (&hero_path, "superhero")] {
        for table in introspect(path, db_id).unwrap() {
            expected.insert((db_id.to_string(), table.name));
        }
    }

    let loaded: BTreeSet<_> = sink
        .text_column(TABLE_SCHEMAS_TABLE, "DB_ID")
        .into_iter()
        .zip(sink.text_column(TABLE_SCHEMAS_TABLE, "TABLE_NAME"))
        .collect();
    assert_eq!(loaded, expected);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = data_dir();
    let settings = settings(dir.path());

    let (sink, first) = run(MemorySink::new(), &settings).await;
    let counts = |sink: &MemorySink| -> Vec<(String, usize)> {
        sink.tables
            .iter()
            .map(|(name, t)| (name.clone(), t.rows.len()))
            .collect()
    };
    let after_first = counts(&sink);

    let (sink, second) = run(sink, &settings).await;
    assert_eq!(counts(&sink), after_first);
    assert_eq!(first.rows_loaded(), second.rows_loaded());
    assert_eq!(sink.rows(TABLE_DATA_INFO_TABLE).len(), 5);
}

#[tokio::test]
async fn test_failed_batch_keeps_earlier_batches() {
    let dir = data_dir();
    let sink = MemorySink::new().fail_batch(
        "BIRD_CARD_GAMES_CARDS",
        3,
        SinkError::Permanent("Numeric value 'abc' is not recognized".into()),
    );
    let (sink, report) = run(sink, &settings(dir.path())).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.failed_tables(), 1);
    assert_eq!(report.loaded_tables(), 4);

    let cards = report
        .tables
        .iter()
        .find(|t| t.table_name == "cards")
        .unwrap();
    assert!(!cards.success);
    assert_eq!(cards.row_count, 20);
    assert!(cards.error.as_deref().unwrap().contains("at row 20"));
    assert_eq!(sink.rows("BIRD_CARD_GAMES_CARDS").len(), 20);

    // The next table in the same database still loads.
    assert_eq!(sink.rows("BIRD_CARD_GAMES_RULINGS").len(), 3);

    let info = sink
        .records(TABLE_DATA_INFO_TABLE)
        .into_iter()
        .find(|r| r["TABLE_NAME"] == Value::from("cards"))
        .unwrap();
    assert_eq!(info["DATA_LOADED"], Value::Boolean(false));
    assert_eq!(info["ROW_COUNT"], Value::Integer(20));
    assert_eq!(info["SOURCE_ROW_COUNT"], Value::Integer(25));
}

#[tokio::test]
async fn test_failed_metadata_insert_fails_run() {
    let dir = data_dir();
    let sink = MemorySink::new().fail_batch(
        TABLE_SCHEMAS_TABLE,
        1,
        SinkError::Permanent("String 'x' is too long".into()),
    );
    let (sink, report) = run(sink, &settings(dir.path())).await;

    assert_eq!(report.metadata_failures, 1);
    assert!(report.fatal.is_none());
    assert_eq!(report.exit_code(), 1);
    // Data tables still load.
    assert_eq!(report.loaded_tables(), 5);
    assert_eq!(sink.rows(TABLE_DATA_INFO_TABLE).len(), 5);
}

#[tokio::test]
async fn test_colliding_names_across_databases() {
    let dir = TempDir::new().unwrap();
    sqlite_db(
        dir.path(),
        "a",
        "CREATE TABLE b_c (id INTEGER); INSERT INTO b_c VALUES (1), (2);",
    );
    sqlite_db(
        dir.path(),
        "a_b",
        "CREATE TABLE c (id INTEGER); INSERT INTO c VALUES (7);",
    );
    let (sink, report) = run(MemorySink::new(), &settings(dir.path())).await;

    assert_eq!(report.tables.len(), 2);
    assert!(report.tables[0].success);
    let loser = &report.tables[1];
    assert_eq!((loser.db_id.as_str(), loser.table_name.as_str()), ("a_b", "c"));
    assert!(!loser.success);
    assert_eq!(
        loser.error.as_deref(),
        Some("warehouse table BIRD_A_B_C collides with a.b_c")
    );

    assert_eq!(sink.rows("BIRD_A_B_C").len(), 2);
    assert_eq!(report.failed_databases.len(), 1);
    assert_eq!(report.failed_databases[0].db_id, "a_b");
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let dir = data_dir();
    let sink = MemorySink::new().fail_batch(
        "BIRD_SUPERHERO_PUBLISHER",
        1,
        SinkError::Throttled("too many requests".into()),
    );
    let (sink, report) = run(sink, &settings(dir.path())).await;

    assert!(report.is_success());
    assert_eq!(report.retries, 1);
    assert_eq!(sink.rows("BIRD_SUPERHERO_PUBLISHER").len(), 2);
}

#[tokio::test]
async fn test_connection_error_aborts_run() {
    let dir = data_dir();
    let sink = MemorySink::new().fail_batch(
        "BIRD_CARD_GAMES_CARDS",
        1,
        SinkError::Connection("session expired".into()),
    );
    let (sink, report) = run(sink, &settings(dir.path())).await;

    assert!(matches!(
        report.fatal,
        Some(birdload::pipeline::RunError::Sink(SinkError::Connection(_)))
    ));
    assert_eq!(report.exit_code(), 1);
    assert!(sink.closed);
    // card_games sorts first; nothing after the failure was attempted.
    assert!(!sink.tables.contains_key("BIRD_SUPERHERO_PUBLISHER"));
    assert!(sink.executed("CREATE OR REPLACE VIEW").is_empty());
}

#[tokio::test]
async fn test_foreign_keys_are_closed() {
    let dir = data_dir();
    let (sink, report) = run(MemorySink::new(), &settings(dir.path())).await;

    // legalities.set_code -> sets(code) has no target.
    assert_eq!(report.normalization_errors, 1);

    let columns: BTreeSet<(String, String, String)> = sink
        .records(TABLE_SCHEMAS_TABLE)
        .into_iter()
        .map(|r| (text(&r["DB_ID"]), text(&r["TABLE_NAME"]), text(&r["COLUMN_NAME"])))
        .collect();

    let edges = sink.records(FOREIGN_KEYS_TABLE);
    assert_eq!(edges.len(), 2);
    for edge in edges {
        let db = text(&edge["DB_ID"]);
        let source = (db.clone(), text(&edge["SOURCE_TABLE"]), text(&edge["SOURCE_COLUMN"]));
        let target = (db, text(&edge["TARGET_TABLE"]), text(&edge["TARGET_COLUMN"]));
        assert!(columns.contains(&source));
        assert!(columns.contains(&target));
    }
}

#[tokio::test]
async fn test_unreadable_database_fails_run() {
    let dir = data_dir();
    fs::write(dir.path().join("broken.sqlite"), "not a database at all").unwrap();
    let (sink, report) = run(MemorySink::new(), &settings(dir.path())).await;

    assert_eq!(report.databases, 3);
    assert_eq!(report.failed_databases.len(), 1);
    assert_eq!(report.failed_databases[0].db_id, "broken");
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.loaded_tables(), 5);
    assert_eq!(sink.rows(DATABASES_TABLE).len(), 2);
}

#[tokio::test]
async fn test_questions_are_loaded() {
    let dir = data_dir();
    let corpus = dir.path().join("dev.json");
    fs::write(
        &corpus,
        r#"[{"id": "q1", "db_id": "card_games", "question": "How many cards?",
             "sql": "SELECT COUNT(*) FROM cards", "difficulty": "simple"}]"#,
    )
    .unwrap();
    let mut settings = settings(dir.path());
    settings.source.questions = Some(corpus.to_string_lossy().into_owned());

    let (sink, report) = run(MemorySink::new(), &settings).await;
    assert!(report.is_success());
    assert_eq!(report.questions_loaded, 1);

    let rows = sink.records(QUESTIONS_TABLE);
    let q1 = rows.iter().find(|r| r["ID"] == Value::from("q1")).unwrap();
    assert_eq!(q1["DB_ID"], Value::from("card_games"));
    assert_eq!(q1["SQL_QUERY"], Value::from("SELECT COUNT(*) FROM cards"));
}

#[tokio::test]
async fn test_missing_corpus_fails_run() {
    let dir = data_dir();
    let mut settings = settings(dir.path());
    let missing = dir.path().join("missing.json");
    settings.source.questions = Some(missing.to_string_lossy().into_owned());

    let (sink, report) = run(MemorySink::new(), &settings).await;
    assert!(report.corpus_error.is_some());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.loaded_tables(), 5);
    assert!(sink.rows(QUESTIONS_TABLE).is_empty());
}

#[tokio::test]
async fn test_table_limit() {
    let dir = data_dir();
    let mut settings = settings(dir.path());
    settings.load.max_tables = 2;

    let (sink, report) = run(MemorySink::new(), &settings).await;
    assert_eq!(report.tables.len(), 2);
    assert_eq!(report.skipped_tables, 3);
    assert!(sink.tables.contains_key("BIRD_CARD_GAMES_CARDS"));
    assert!(!sink.tables.contains_key("BIRD_SUPERHERO_PUBLISHER"));
}

#[tokio::test]
async fn test_fail_policy_rejects_existing_tables() {
    let dir = data_dir();
    let mut settings = settings(dir.path());
    settings.load.existing_tables = birdload::config::ExistingTablePolicy::Fail;

    let (sink, first) = run(MemorySink::new(), &settings).await;
    assert!(first.is_success());

    let (sink, second) = run(sink, &settings).await;
    assert_eq!(second.loaded_tables(), 0);
    assert!(second.tables[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("create table failed"));
    // Existing data is untouched.
    assert_eq!(sink.rows("BIRD_CARD_GAMES_CARDS").len(), 25);
    assert_eq!(second.exit_code(), 1);
}

#[tokio::test]
async fn test_views_can_be_disabled() {
    let dir = data_dir();
    let mut settings = settings(dir.path());
    settings.load.create_views = false;

    let (sink, report) = run(MemorySink::new(), &settings).await;
    assert_eq!(report.views_created, 0);
    assert!(sink.executed("CREATE OR REPLACE VIEW").is_empty());
}

#[tokio::test]
async fn test_dry_run_script() {
    let dir = data_dir();
    let (sink, report) = run(ScriptSink::new(Vec::new()), &settings(dir.path())).await;
    assert!(report.is_success());

    let script = String::from_utf8(sink.into_inner()).unwrap();
    let first = script.lines().next().unwrap();
    assert!(first.starts_with(r#"CREATE OR REPLACE TABLE "BIRD_DATABASES""#));
    assert!(script.contains(r#"CREATE OR REPLACE TABLE "BIRD_CARD_GAMES_CARDS" ("ID" BIGINT, "NAME" VARCHAR, "COST" DOUBLE);"#));
    assert!(script.contains(r#"INSERT INTO "BIRD_SUPERHERO_PUBLISHER" ("ID", "PUBLISHER_NAME") VALUES (1, 'Marvel Comics'), (2, 'DC Comics');"#));
    assert!(script.trim_end().ends_with(';'));
    assert!(script.contains(r#"CREATE OR REPLACE VIEW "BIRD_RELATIONSHIP_COMPLEXITY""#));
}

fn text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_sql_literal(),
    }
}
