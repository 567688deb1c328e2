//! # birdload
//!
//! Loads the BIRD text-to-SQL benchmark into a Snowflake warehouse.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           Data directory (*.sqlite) + dev.json           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [source::discover / introspect]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SourceDatabase + TableSchema (per database)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!            ┌─────────────┴──────────────┐
//!            ▼ [metadata::normalize]      ▼ [transfer]
//! ┌──────────────────────────┐  ┌──────────────────────────┐
//! │ BIRD_DATABASES           │  │ BIRD_<DB>_<TABLE>        │
//! │ BIRD_TABLE_SCHEMAS       │  │ BIRD_TABLE_DATA_INFO     │
//! │ BIRD_FOREIGN_KEYS        │  │                          │
//! └──────────────────────────┘  └──────────────────────────┘
//!                          │
//!                          ▼ [warehouse::Session]
//! ┌─────────────────────────────────────────────────────────┐
//! │      WarehouseSink (worker process or SQL script)        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The whole run is sequential. [`pipeline::run`] owns the warehouse session
//! for the duration of the run and releases it on every exit path.

pub mod config;
pub mod metadata;
pub mod pipeline;
pub mod questions;
pub mod source;
pub mod sql;
pub mod transfer;
pub mod warehouse;
pub mod worker;

pub use metadata::{Column, ForeignKeyEdge, SourceDatabase, TableLoadStatus, TableSchema};
pub use pipeline::{run, RunReport};
pub use sql::{Row, Value};
pub use warehouse::{Session, SinkError, WarehouseSink};
