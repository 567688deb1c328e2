//! Protocol types for warehouse worker communication.
//!
//! One JSON object per line in each direction. Requests carry a unique id;
//! the worker answers each request with exactly one response carrying the
//! same id.
//!
//! ```text
//! -> {"id":"…","method":"warehouse.batch_insert","params":{"session_id":"s1","table":"T","columns":["A"],"rows":[[1]]}}
//! <- {"id":"…","success":true,"result":{"rows_inserted":1}}
//! <- {"id":"…","success":false,"error":{"code":"THROTTLED","message":"…"}}
//! ```

use serde::{Deserialize, Serialize};

use crate::config::WarehouseConnection;
use crate::sql::Row;

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// Method name (e.g., "warehouse.execute").
    pub method: String,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

/// Response envelope received from the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error information (present if success = false).
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Error information in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    /// Error code (see [`codes`]).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Request Parameters
// ============================================================================

/// Parameters for `warehouse.connect`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectParams<'a> {
    #[serde(flatten)]
    pub connection: &'a WarehouseConnection,
}

/// Parameters for `warehouse.execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteParams<'a> {
    pub session_id: &'a str,
    pub sql: &'a str,
}

/// Parameters for `warehouse.batch_insert`.
///
/// Values are encoded as JSON scalars; blobs as `{"$binary": "<base64>"}`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchInsertParams<'a> {
    pub session_id: &'a str,
    pub table: &'a str,
    pub columns: &'a [String],
    pub rows: &'a [Row],
}

/// Parameters for `warehouse.close`.
#[derive(Debug, Clone, Serialize)]
pub struct CloseParams<'a> {
    pub session_id: &'a str,
}

// ============================================================================
// Response Types
// ============================================================================

/// Response from `warehouse.connect`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectResponse {
    /// Session handle for subsequent requests.
    pub session_id: String,
    /// Server version, if the worker reports it.
    #[serde(default)]
    pub server_version: Option<String>,
}

/// Response from `warehouse.execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    /// Rows affected (for DML).
    #[serde(default)]
    pub rows_affected: Option<i64>,
}

/// Response from `warehouse.batch_insert`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchInsertResponse {
    pub rows_inserted: u64,
}

/// Response from `warehouse.close`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseResponse {}

// ============================================================================
// Method Names
// ============================================================================

/// Worker method names.
pub mod methods {
    pub const CONNECT: &str = "warehouse.connect";
    pub const EXECUTE: &str = "warehouse.execute";
    pub const BATCH_INSERT: &str = "warehouse.batch_insert";
    pub const CLOSE: &str = "warehouse.close";
}

/// Worker error codes.
pub mod codes {
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const THROTTLED: &str = "THROTTLED";
    pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
    pub const WORKER_EXITED: &str = "WORKER_EXITED";
}
