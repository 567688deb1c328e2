//! Identifier and literal helpers for Snowflake SQL.

use std::collections::HashSet;

// =============================================================================
// Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Warehouse naming
// =============================================================================

/// Prefix for every generated data table.
pub const DATA_TABLE_PREFIX: &str = "BIRD";

/// Uppercase and replace every non-alphanumeric character with `_`.
///
/// Non-ASCII letters and digits are replaced too, so the result is always a
/// plain ASCII identifier.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Warehouse table name for a source table: `BIRD_<DB_ID>_<TABLE>`.
pub fn warehouse_table_name(db_id: &str, table: &str) -> String {
    format!(
        "{}_{}_{}",
        DATA_TABLE_PREFIX,
        sanitize_identifier(db_id),
        sanitize_identifier(table)
    )
}

/// Sanitized warehouse column names, in source order.
///
/// Two source names can sanitize to the same identifier (`"a b"` and `"a-b"`);
/// later duplicates get `_2`, `_3`, ... appended until unique. Empty names
/// become `COLUMN_<n>` (1-based ordinal).
pub fn warehouse_column_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (idx, name) in names.into_iter().enumerate() {
        let mut base = sanitize_identifier(name);
        if base.is_empty() {
            base = format!("COLUMN_{}", idx + 1);
        }

        let mut candidate = base.clone();
        let mut n = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        out.push(candidate);
    }

    out
}
