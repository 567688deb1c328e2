//! Table transfer against the in-memory warehouse.

#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use birdload::config::ExistingTablePolicy;
use birdload::metadata::tables::TABLE_DATA_INFO_TABLE;
use birdload::metadata::metadata_table_definitions;
use birdload::source::{inspect, open_read_only, DatabaseFile, Introspection};
use birdload::sql::WarehouseType;
use birdload::transfer::{
    create_table_statement, transfer_database, transfer_table, TableTargets, TransferOptions,
};
use birdload::warehouse::RetryPolicy;
use birdload::{Session, SinkError, TableLoadStatus, Value};
use common::{card_games, sqlite_db, MemorySink};
use tempfile::TempDir;

fn options(batch_size: usize) -> TransferOptions {
    TransferOptions {
        batch_size,
        existing_tables: ExistingTablePolicy::Replace,
    }
}

async fn session(sink: MemorySink) -> Session<MemorySink> {
    let policy = RetryPolicy {
        max_attempts: 1,
        initial_backoff: Duration::ZERO,
    };
    let mut session = Session::new(sink, policy);
    for table in metadata_table_definitions() {
        session.execute(&table.to_sql()).await.unwrap();
    }
    session
}

fn targets(db: &Introspection) -> TableTargets {
    TableTargets::for_tables(&db.tables)
}

async fn transfer(
    session: &mut Session<MemorySink>,
    db: &Introspection,
    options: &TransferOptions,
) -> Result<Vec<TableLoadStatus>, SinkError> {
    transfer_database(session, &db.database, &db.tables, &mut targets(db), options).await
}

fn card_games_db(dir: &TempDir) -> Introspection {
    let path = card_games(dir.path());
    inspect(&DatabaseFile::from_path(path)).unwrap()
}

#[test]
fn test_cards_column_types() {
    let dir = TempDir::new().unwrap();
    let db = card_games_db(&dir);
    let cards = db.tables.iter().find(|t| t.name == "cards").unwrap();

    let ddl = create_table_statement(cards, ExistingTablePolicy::Replace);
    assert_eq!(ddl.name, "BIRD_CARD_GAMES_CARDS");
    let columns: Vec<(&str, WarehouseType)> = ddl
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.data_type))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("ID", WarehouseType::BigInt),
            ("NAME", WarehouseType::Varchar),
            ("COST", WarehouseType::Double),
        ]
    );
    assert_eq!(
        ddl.to_sql(),
        r#"CREATE OR REPLACE TABLE "BIRD_CARD_GAMES_CARDS" ("ID" BIGINT, "NAME" VARCHAR, "COST" DOUBLE)"#
    );
}

#[tokio::test]
async fn test_rows_arrive_in_batches() {
    let dir = TempDir::new().unwrap();
    let db = card_games_db(&dir);
    let cards = db.tables.iter().find(|t| t.name == "cards").unwrap();
    let conn = open_read_only(&db.database.path).unwrap();

    let mut session = session(MemorySink::new()).await;
    let status = transfer_table(&mut session, &conn, cards, &options(7))
        .await
        .unwrap();
    assert!(status.success);
    assert_eq!(status.row_count, 25);
    assert_eq!(status.warehouse_table, "BIRD_CARD_GAMES_CARDS");

    let rows = session.sink().rows("BIRD_CARD_GAMES_CARDS");
    assert_eq!(rows.len(), 25);
    assert_eq!(
        rows[0],
        vec![Value::Integer(1), Value::from("Card 1"), Value::Real(1.5)]
    );
}

#[tokio::test]
async fn test_empty_table_loads() {
    let dir = TempDir::new().unwrap();
    let path = sqlite_db(dir.path(), "empty", "CREATE TABLE t (a INTEGER, b BLOB);");
    let db = inspect(&DatabaseFile::from_path(path)).unwrap();

    let mut session = session(MemorySink::new()).await;
    let statuses = transfer(&mut session, &db, &options(10)).await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].success);
    assert_eq!(statuses[0].row_count, 0);
    assert!(session.sink().tables.contains_key("BIRD_EMPTY_T"));
}

#[tokio::test]
async fn test_create_failure_skips_table() {
    let dir = TempDir::new().unwrap();
    let db = card_games_db(&dir);

    let mut sink = MemorySink::new();
    sink.tables.insert("BIRD_CARD_GAMES_CARDS".into(), Default::default());
    let mut session = session(sink).await;

    let opts = TransferOptions {
        batch_size: 10,
        existing_tables: ExistingTablePolicy::Fail,
    };
    let statuses = transfer(&mut session, &db, &opts).await.unwrap();

    let cards = statuses.iter().find(|s| s.table_name == "cards").unwrap();
    assert!(!cards.success);
    assert_eq!(cards.row_count, 0);
    assert!(cards.error.as_deref().unwrap().contains("already exists"));
    assert!(statuses
        .iter()
        .filter(|s| s.table_name != "cards")
        .all(|s| s.success));
}

#[tokio::test]
async fn test_status_rows_are_appended() {
    let dir = TempDir::new().unwrap();
    let db = card_games_db(&dir);
    let sink = MemorySink::new().fail_batch(
        "BIRD_CARD_GAMES_RULINGS",
        1,
        SinkError::Permanent("bad row".into()),
    );
    let mut session = session(sink).await;

    transfer(&mut session, &db, &options(10)).await.unwrap();

    let infos = session.sink().records(TABLE_DATA_INFO_TABLE);
    let names: Vec<_> = infos.iter().map(|r| r["TABLE_NAME"].clone()).collect();
    assert_eq!(
        names,
        vec![Value::from("cards"), Value::from("legalities"), Value::from("rulings")]
    );
    let rulings = &infos[2];
    assert_eq!(rulings["DATA_LOADED"], Value::Boolean(false));
    assert_eq!(rulings["ROW_COUNT"], Value::Integer(0));
    assert_eq!(
        rulings["ERROR_MESSAGE"],
        Value::from("batch insert failed at row 0: bad row")
    );
}

#[tokio::test]
async fn test_missing_source_marks_every_table_failed() {
    let dir = TempDir::new().unwrap();
    let db = card_games_db(&dir);
    std::fs::remove_file(&db.database.path).unwrap();

    let mut session = session(MemorySink::new()).await;
    let statuses = transfer(&mut session, &db, &options(10)).await.unwrap();

    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| !s.success && s.row_count == 0));
    assert!(statuses[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("source database unavailable"));
    assert_eq!(session.sink().rows(TABLE_DATA_INFO_TABLE).len(), 3);
}

#[tokio::test]
async fn test_connection_error_stops_transfer() {
    let dir = TempDir::new().unwrap();
    let db = card_games_db(&dir);
    let sink = MemorySink::new().fail_batch(
        "BIRD_CARD_GAMES_CARDS",
        2,
        SinkError::Connection("worker exited".into()),
    );
    let mut session = session(sink).await;

    let err = transfer(&mut session, &db, &options(10)).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(!session.sink().tables.contains_key("BIRD_CARD_GAMES_LEGALITIES"));
    assert!(session.sink().rows(TABLE_DATA_INFO_TABLE).is_empty());
}

#[tokio::test]
async fn test_colliding_names_do_not_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = sqlite_db(
        dir.path(),
        "shop",
        r#"CREATE TABLE "order items" (id INTEGER);
           CREATE TABLE order_items (id INTEGER);
           INSERT INTO "order items" VALUES (1), (2), (3);
           INSERT INTO order_items VALUES (9);"#,
    );
    let db = inspect(&DatabaseFile::from_path(path)).unwrap();

    let mut session = session(MemorySink::new()).await;
    let statuses = transfer(&mut session, &db, &options(10)).await.unwrap();

    assert_eq!(statuses[0].table_name, "order items");
    assert!(statuses[0].success);
    assert_eq!(statuses[0].row_count, 3);

    assert_eq!(statuses[1].table_name, "order_items");
    assert!(!statuses[1].success);
    assert_eq!(statuses[1].row_count, 0);
    assert_eq!(
        statuses[1].error.as_deref(),
        Some("warehouse table BIRD_SHOP_ORDER_ITEMS collides with shop.order items")
    );

    assert_eq!(session.sink().rows("BIRD_SHOP_ORDER_ITEMS").len(), 3);
    let creates = session
        .sink()
        .executed(r#"CREATE OR REPLACE TABLE "BIRD_SHOP_ORDER_ITEMS""#);
    assert_eq!(creates.len(), 1);
    assert_eq!(session.sink().rows(TABLE_DATA_INFO_TABLE).len(), 2);
}
