//! Normalization of introspected fixtures.

#[path = "../common/mod.rs"]
mod common;

use birdload::metadata::{normalize, MetadataRecord, NormalizationError, TableSchema};
use birdload::source::{inspect, DatabaseFile};
use birdload::Value;
use common::{card_games, sqlite_db, superhero};
use tempfile::TempDir;

fn load(dir: &TempDir) -> (Vec<birdload::SourceDatabase>, Vec<TableSchema>) {
    let mut databases = Vec::new();
    let mut tables = Vec::new();
    for path in [card_games(dir.path()), superhero(dir.path())] {
        let found = inspect(&DatabaseFile::from_path(path)).unwrap();
        databases.push(found.database);
        tables.extend(found.tables);
    }
    (databases, tables)
}

#[test]
fn test_column_rows_are_ordered() {
    let dir = TempDir::new().unwrap();
    let (databases, tables) = load(&dir);
    let meta = normalize(&databases, &tables);

    let ids: Vec<&str> = meta.columns.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "card_games.cards.id",
            "card_games.cards.name",
            "card_games.cards.cost",
            "card_games.legalities.id",
            "card_games.legalities.set_code",
            "card_games.legalities.format",
            "card_games.rulings.id",
            "card_games.rulings.card_id",
            "card_games.rulings.text",
            "superhero.publisher.id",
            "superhero.publisher.publisher_name",
            "superhero.superhero.id",
            "superhero.superhero.superhero_name",
            "superhero.superhero.publisher_id",
            "superhero.superhero.height_cm",
        ]
    );
    assert_eq!(meta.load_placeholders.len(), 5);
    assert_eq!(meta.databases.len(), 2);
    assert_eq!(meta.databases[0].num_tables, 3);
}

#[test]
fn test_input_order_does_not_matter() {
    let dir = TempDir::new().unwrap();
    let (mut databases, mut tables) = load(&dir);
    let first = normalize(&databases, &tables);

    databases.reverse();
    tables.reverse();
    let second = normalize(&databases, &tables);

    let rows = |m: &birdload::metadata::NormalizedMetadata| -> Vec<Vec<Value>> {
        m.columns.iter().map(MetadataRecord::to_row).collect()
    };
    assert_eq!(rows(&first), rows(&second));
    assert_eq!(first.foreign_keys, second.foreign_keys);
}

#[test]
fn test_foreign_key_flags() {
    let dir = TempDir::new().unwrap();
    let (databases, tables) = load(&dir);
    let meta = normalize(&databases, &tables);

    let card_id = meta
        .columns
        .iter()
        .find(|c| c.id == "card_games.rulings.card_id")
        .unwrap();
    assert!(card_id.is_foreign_key);
    assert_eq!(card_id.foreign_table.as_deref(), Some("cards"));
    assert_eq!(card_id.foreign_column.as_deref(), Some("id"));

    let set_code = meta
        .columns
        .iter()
        .find(|c| c.id == "card_games.legalities.set_code")
        .unwrap();
    assert!(!set_code.is_foreign_key);

    let fk_ids: Vec<&str> = meta.foreign_keys.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(
        fk_ids,
        vec![
            "card_games.rulings.card_id->cards.id",
            "superhero.superhero.publisher_id->publisher.id",
        ]
    );
    assert!(matches!(
        meta.errors.as_slice(),
        [NormalizationError::UnknownTable { referenced_table, .. }] if referenced_table == "sets"
    ));
}

#[test]
fn test_implicit_and_mixed_case_references() {
    let dir = TempDir::new().unwrap();
    let path = sqlite_db(
        dir.path(),
        "debit_card_specializing",
        "CREATE TABLE customers (CustomerID INTEGER PRIMARY KEY, Segment TEXT);
         CREATE TABLE transactions_1k (
             TransactionID INTEGER PRIMARY KEY,
             CustomerID INTEGER REFERENCES Customers,
             GasStationID INTEGER REFERENCES gasstations(gasstationid)
         );
         CREATE TABLE gasstations (GasStationID INTEGER PRIMARY KEY, Country TEXT);",
    );
    let found = inspect(&DatabaseFile::from_path(path)).unwrap();
    let meta = normalize(&[found.database], &found.tables);

    assert!(meta.errors.is_empty(), "{:?}", meta.errors);
    let targets: Vec<(&str, &str)> = meta
        .foreign_keys
        .iter()
        .map(|f| (f.target_table.as_str(), f.target_column.as_str()))
        .collect();
    assert_eq!(
        targets,
        vec![("customers", "CustomerID"), ("gasstations", "GasStationID")]
    );
}
