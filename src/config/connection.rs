//! Warehouse connection configuration.
//!
//! Values come from the `[warehouse]` section of the config file and, for
//! anything left unset there, from environment variables:
//! - `SNOWFLAKE_ACCOUNT`: Account identifier (required)
//! - `SNOWFLAKE_USER`: Login name (required)
//! - `SNOWFLAKE_PASSWORD`: Password (required)
//! - `SNOWFLAKE_WAREHOUSE`: Virtual warehouse (default `COMPUTE_WH`)
//! - `SNOWFLAKE_DATABASE`: Target database (default `BIRD_DB`)
//! - `SNOWFLAKE_SCHEMA`: Target schema (default `PUBLIC`)
//! - `SNOWFLAKE_ROLE`: Role (default `DEV`)
//!
//! Template placeholders such as `YOUR_ACCOUNT` count as unset.

use std::env;
use std::fmt;

use serde::Serialize;

use super::settings::{expand_env_vars, SettingsError, WarehouseSettings};

const DEFAULT_WAREHOUSE: &str = "COMPUTE_WH";
const DEFAULT_DATABASE: &str = "BIRD_DB";
const DEFAULT_SCHEMA: &str = "PUBLIC";
const DEFAULT_ROLE: &str = "DEV";

const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing warehouse setting '{field}' (set [warehouse].{field} or {env_var})")]
    MissingField {
        field: &'static str,
        env_var: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Resolved Snowflake connection parameters.
///
/// Passed opaquely to the warehouse worker in `warehouse.connect`.
#[derive(Clone, Serialize)]
pub struct WarehouseConnection {
    pub account: String,
    pub user: String,
    pub password: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: String,
}

impl fmt::Debug for WarehouseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConnection")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"********")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .finish()
    }
}

impl WarehouseConnection {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConnectionError> {
        Self::resolve(&WarehouseSettings::default())
    }

    /// Resolve config file values, filling gaps from the environment.
    pub fn resolve(settings: &WarehouseSettings) -> Result<Self, ConnectionError> {
        let required = |value: &Option<String>, field, env_var| {
            lookup(value, env_var)?.ok_or(ConnectionError::MissingField { field, env_var })
        };
        let optional = |value: &Option<String>, env_var, default: &str| {
            lookup(value, env_var).map(|v| v.unwrap_or_else(|| default.to_string()))
        };

        Ok(Self {
            account: required(&settings.account, "account", "SNOWFLAKE_ACCOUNT")?,
            user: required(&settings.user, "user", "SNOWFLAKE_USER")?,
            password: required(&settings.password, "password", "SNOWFLAKE_PASSWORD")?,
            warehouse: optional(&settings.warehouse, "SNOWFLAKE_WAREHOUSE", DEFAULT_WAREHOUSE)?,
            database: optional(&settings.database, "SNOWFLAKE_DATABASE", DEFAULT_DATABASE)?,
            schema: optional(&settings.schema, "SNOWFLAKE_SCHEMA", DEFAULT_SCHEMA)?,
            role: optional(&settings.role, "SNOWFLAKE_ROLE", DEFAULT_ROLE)?,
        })
    }
}

/// Config value first, then the environment variable.
fn lookup(value: &Option<String>, env_var: &str) -> Result<Option<String>, ConnectionError> {
    if let Some(raw) = value {
        match expand_env_vars(raw) {
            Ok(expanded) if is_set(&expanded) => return Ok(Some(expanded)),
            Ok(_) | Err(SettingsError::MissingEnvVar(_)) => {}
            Err(e) => return Err(ConnectionError::InvalidConfig(e.to_string())),
        }
    }
    Ok(env::var(env_var).ok().filter(|v| is_set(v)))
}

fn is_set(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.to_ascii_uppercase().starts_with(PLACEHOLDER_PREFIX)
}
