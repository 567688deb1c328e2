//! Configuration module for birdload.
//!
//! Handles the warehouse connection, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionError, WarehouseConnection};
pub use settings::{
    expand_env_vars, ExistingTablePolicy, LoadSettings, RetrySettings, Settings, SettingsError,
    SourceSettings, WarehouseSettings, WorkerSettings, WORKER_BINARY,
};
