//! Summary views over the metadata tables.
//!
//! Created at the end of a run. A failed view is logged and does not affect
//! the run outcome.

use crate::sql::CreateView;

use super::tables::{
    DATABASES_TABLE, FOREIGN_KEYS_TABLE, QUESTIONS_TABLE, TABLE_DATA_INFO_TABLE,
    TABLE_SCHEMAS_TABLE,
};

pub const COMPREHENSIVE_SUMMARY_VIEW: &str = "BIRD_COMPREHENSIVE_SUMMARY";
pub const SCHEMA_OVERVIEW_VIEW: &str = "BIRD_SCHEMA_OVERVIEW";
pub const DATA_AVAILABILITY_VIEW: &str = "BIRD_DATA_AVAILABILITY";
pub const RELATIONSHIP_COMPLEXITY_VIEW: &str = "BIRD_RELATIONSHIP_COMPLEXITY";

/// All summary views, in creation order.
pub fn summary_views() -> Vec<CreateView> {
    vec![
        comprehensive_summary(),
        schema_overview(),
        data_availability(),
        relationship_complexity(),
    ]
}

/// Question statistics per domain.
fn comprehensive_summary() -> CreateView {
    let query = format!(
        r#"
SELECT d."DOMAIN",
    COUNT(DISTINCT q."DB_ID") AS "DATABASE_COUNT",
    COUNT(q."ID") AS "QUESTION_COUNT",
    AVG(LENGTH(q."QUESTION")) AS "AVG_QUESTION_LENGTH",
    AVG(LENGTH(q."SQL_QUERY")) AS "AVG_SQL_LENGTH",
    SUM(d."NUM_TABLES") AS "TOTAL_TABLES",
    AVG(d."SIZE_MB") AS "AVG_DB_SIZE_MB"
FROM "{QUESTIONS_TABLE}" q
JOIN "{DATABASES_TABLE}" d ON q."DB_ID" = d."DB_ID"
GROUP BY d."DOMAIN"
ORDER BY "QUESTION_COUNT" DESC
"#
    );
    CreateView::new(COMPREHENSIVE_SUMMARY_VIEW, query).or_replace()
}

/// Table and key column counts per database.
fn schema_overview() -> CreateView {
    let query = format!(
        r#"
SELECT s."DB_ID",
    d."DOMAIN",
    COUNT(DISTINCT s."TABLE_NAME") AS "TABLE_COUNT",
    COUNT(s."COLUMN_NAME") AS "TOTAL_COLUMNS",
    COUNT(CASE WHEN s."IS_PRIMARY_KEY" THEN 1 END) AS "PRIMARY_KEY_COLUMNS",
    COUNT(CASE WHEN s."IS_FOREIGN_KEY" THEN 1 END) AS "FOREIGN_KEY_COLUMNS"
FROM "{TABLE_SCHEMAS_TABLE}" s
JOIN "{DATABASES_TABLE}" d ON s."DB_ID" = d."DB_ID"
GROUP BY s."DB_ID", d."DOMAIN"
ORDER BY "TABLE_COUNT" DESC
"#
    );
    CreateView::new(SCHEMA_OVERVIEW_VIEW, query).or_replace()
}

/// Loaded tables and rows per database.
fn data_availability() -> CreateView {
    let query = format!(
        r#"
SELECT t."DB_ID",
    d."DOMAIN",
    COUNT(*) AS "TOTAL_TABLES",
    COUNT(CASE WHEN t."DATA_LOADED" THEN 1 END) AS "TABLES_LOADED",
    SUM(t."ROW_COUNT") AS "TOTAL_ROWS",
    AVG(t."ROW_COUNT") AS "AVG_ROWS_PER_TABLE"
FROM "{TABLE_DATA_INFO_TABLE}" t
JOIN "{DATABASES_TABLE}" d ON t."DB_ID" = d."DB_ID"
GROUP BY t."DB_ID", d."DOMAIN"
ORDER BY "TOTAL_ROWS" DESC
"#
    );
    CreateView::new(DATA_AVAILABILITY_VIEW, query).or_replace()
}

/// Foreign key density per database.
fn relationship_complexity() -> CreateView {
    let query = format!(
        r#"
SELECT fk."DB_ID",
    d."DOMAIN",
    COUNT(*) AS "FOREIGN_KEY_COUNT",
    COUNT(DISTINCT fk."SOURCE_TABLE") AS "TABLES_WITH_FKS",
    COUNT(DISTINCT fk."TARGET_TABLE") AS "REFERENCED_TABLES"
FROM "{FOREIGN_KEYS_TABLE}" fk
JOIN "{DATABASES_TABLE}" d ON fk."DB_ID" = d."DB_ID"
GROUP BY fk."DB_ID", d."DOMAIN"
ORDER BY "FOREIGN_KEY_COUNT" DESC
"#
    );
    CreateView::new(RELATIONSHIP_COMPLEXITY_VIEW, query).or_replace()
}
