//! SQL generation module.
//!
//! Everything the loader sends to Snowflake is built here:
//!
//! - [`types`] - warehouse column types and the source type mapping
//! - [`ddl`] - CREATE TABLE, CREATE VIEW
//! - [`dml`] - multi-row INSERT rendering
//! - [`value`] - cell values and rows
//! - [`helpers`] - quoting and warehouse naming

pub mod ddl;
pub mod dml;
pub mod helpers;
pub mod types;
pub mod value;


pub use ddl::{ColumnDef, CreateTable, CreateView};
pub use dml::Insert;
pub use helpers::{sanitize_identifier, warehouse_column_names, warehouse_table_name};
pub use types::{map_source_type, WarehouseType};
pub use value::{Row, Value};
