//! TOML-based configuration for birdload.
//!
//! Supports a config file (birdload.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [source]
//! data_dir = "./bird_databases"
//! questions = "./dev.json"
//!
//! [load]
//! batch_size = 10000
//! existing_tables = "replace"   # or "fail"
//! max_tables = 0                # 0 = unlimited
//! create_views = true
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 500
//!
//! [warehouse]
//! account = "${SNOWFLAKE_ACCOUNT}"
//! user = "${SNOWFLAKE_USER}"
//! password = "${SNOWFLAKE_PASSWORD}"
//! warehouse = "COMPUTE_WH"
//! database = "BIRD_DB"
//! schema = "PUBLIC"
//!
//! [worker]
//! path = "bird-warehouse-worker"
//! timeout_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::connection::{ConnectionError, WarehouseConnection};

/// Name of the warehouse worker binary.
pub const WORKER_BINARY: &str = "bird-warehouse-worker";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Where the source databases and question corpus live.
    pub source: SourceSettings,

    /// Transfer behaviour.
    pub load: LoadSettings,

    /// Retry policy for transient warehouse errors.
    pub retry: RetrySettings,

    /// Snowflake connection (supports ${ENV_VAR} expansion).
    pub warehouse: WarehouseSettings,

    /// Warehouse worker process.
    pub worker: WorkerSettings,
}

/// Source locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Directory holding the SQLite databases.
    pub data_dir: String,

    /// Question corpus (JSON array or JSON Lines). Optional.
    pub questions: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            data_dir: "./bird_databases".to_string(),
            questions: None,
        }
    }
}

impl SourceSettings {
    /// Data directory with environment variables expanded.
    pub fn resolved_data_dir(&self) -> Result<PathBuf, SettingsError> {
        expand_env_vars(&self.data_dir).map(PathBuf::from)
    }

    /// Question corpus path with environment variables expanded.
    pub fn resolved_questions(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.questions
            .as_deref()
            .map(|q| expand_env_vars(q).map(PathBuf::from))
            .transpose()
    }
}

/// What to do when a data table already exists in the warehouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingTablePolicy {
    /// Drop and recreate (`CREATE OR REPLACE TABLE`).
    #[default]
    Replace,
    /// Plain `CREATE TABLE`; the table is recorded as failed.
    Fail,
}

/// Transfer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadSettings {
    /// Rows per batch insert.
    pub batch_size: usize,

    /// Existing-table policy for data tables.
    pub existing_tables: ExistingTablePolicy,

    /// Maximum number of tables to transfer per run (0 = unlimited).
    pub max_tables: usize,

    /// Create the summary views at the end of the run.
    pub create_views: bool,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            existing_tables: ExistingTablePolicy::Replace,
            max_tables: 0,
            create_views: true,
        }
    }
}

impl LoadSettings {
    /// Table cap, if any.
    pub fn table_limit(&self) -> Option<usize> {
        (self.max_tables > 0).then_some(self.max_tables)
    }
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per call, including the first.
    pub max_attempts: u32,

    /// Backoff before the first retry; doubled for each further retry.
    pub initial_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

/// `[warehouse]` section. Every field may be left out and supplied through
/// `SNOWFLAKE_*` environment variables instead.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseSettings {
    pub account: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to worker binary.
    pub path: Option<String>,

    /// Extra command-line arguments for the worker.
    pub args: Vec<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            path: None,
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl WorkerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from an explicit path or the default config file
    /// locations.
    ///
    /// Searches in order:
    /// 1. `explicit` (the `--config` flag)
    /// 2. Environment variable `BIRDLOAD_CONFIG`
    /// 3. `./birdload.toml`
    /// 4. `~/.config/birdload/config.toml`
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Ok(path) = env::var("BIRDLOAD_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("birdload.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("birdload").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    /// Reject values the loader cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.load.batch_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "load.batch_size must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SettingsError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the warehouse connection (config file, then environment).
    pub fn warehouse_connection(&self) -> Result<WarehouseConnection, ConnectionError> {
        WarehouseConnection::resolve(&self.warehouse)
    }

    /// Get the worker binary path.
    ///
    /// Returns the configured path, else the first local candidate that
    /// exists, else the bare binary name for a `PATH` lookup at spawn time.
    pub fn worker_path(&self) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.worker.path {
            return expand_env_vars(path).map(PathBuf::from);
        }

        let candidates = [
            format!("./{WORKER_BINARY}"),
            format!("./worker/{WORKER_BINARY}"),
        ];
        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        Ok(PathBuf::from(WORKER_BINARY))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
