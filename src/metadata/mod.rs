//! Schema metadata module.
//!
//! Holds the introspected schema records and turns them into the fixed
//! warehouse metadata tables.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SourceDatabase + TableSchema   (from source::introspect)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │ normalize()
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    NormalizedMetadata                           │
//! │  - databases        -> BIRD_DATABASES                           │
//! │  - columns          -> BIRD_TABLE_SCHEMAS                       │
//! │  - foreign_keys     -> BIRD_FOREIGN_KEYS                        │
//! │  - load_placeholders + TableLoadStatus -> BIRD_TABLE_DATA_INFO  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use birdload::metadata::{normalize, MetadataRecord};
//!
//! let meta = normalize(&databases, &schemas);
//! for err in &meta.errors {
//!     eprintln!("skipped: {err}");
//! }
//! let rows: Vec<_> = meta.columns.iter().map(MetadataRecord::to_row).collect();
//! ```

pub mod normalize;
pub mod tables;
mod types;
pub mod views;

pub use normalize::{
    normalize, ColumnRecord, DatabaseRecord, ForeignKeyRecord, LoadPlaceholder,
    NormalizationError, NormalizedMetadata,
};
pub use tables::{metadata_table_definitions, MetadataRecord, TableDataInfo};
pub use types::*;
pub use views::summary_views;
