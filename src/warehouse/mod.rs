//! Warehouse sink.
//!
//! [`WarehouseSink`] is the seam between the loader and the warehouse: DDL
//! goes through `execute`, row data through `batch_insert`. Every call
//! completes before the next one is issued.
//!
//! [`Session`] wraps a sink for the duration of one run and applies the
//! retry policy:
//!
//! | Error                    | Handling                                   |
//! |--------------------------|--------------------------------------------|
//! | `Timeout`, `Throttled`   | retried with exponential backoff           |
//! | `Permanent`              | returned to the caller immediately         |
//! | `Connection`             | returned immediately; the run must stop    |
//!
//! Implementations:
//! - [`WorkerSink`] - Snowflake through the warehouse worker process
//! - [`ScriptSink`] - renders every call as SQL text (dry run)

mod script_sink;
mod worker_sink;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RetrySettings;
use crate::sql::Row;

pub use script_sink::ScriptSink;
pub use worker_sink::WorkerSink;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors reported by a warehouse sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The statement timed out; it may succeed if retried.
    #[error("warehouse timeout: {0}")]
    Timeout(String),

    /// The warehouse is rate limiting; it may succeed if retried.
    #[error("warehouse throttled: {0}")]
    Throttled(String),

    /// The statement was rejected and will fail again if retried.
    #[error("{0}")]
    Permanent(String),

    /// The session is gone.
    #[error("warehouse connection error: {0}")]
    Connection(String),
}

impl SinkError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Throttled(_))
    }

    /// Whether the run has to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Target of DDL and batch DML.
#[async_trait]
pub trait WarehouseSink: Send {
    /// Execute one statement.
    async fn execute(&mut self, sql: &str) -> SinkResult<()>;

    /// Insert `rows` into `table`. Returns the number of rows committed.
    async fn batch_insert(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> SinkResult<u64>;

    /// Release the session.
    async fn close(&mut self) -> SinkResult<()>;
}

/// Retry policy for transient sink errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): doubles each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&RetrySettings::default()).into()
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
        }
    }
}

/// One call, kept so it can be replayed on retry.
enum Call<'a> {
    Execute(&'a str),
    Insert {
        table: &'a str,
        columns: &'a [String],
        rows: &'a [Row],
    },
}

/// A warehouse session for one run.
///
/// Created at run start and released with [`Session::close`] at run end.
/// The session is passed explicitly (`&mut Session<S>`) to every component
/// that talks to the warehouse.
pub struct Session<S: WarehouseSink> {
    sink: S,
    policy: RetryPolicy,
    retries: u64,
}

impl<S: WarehouseSink> Session<S> {
    pub fn new(sink: S, policy: RetryPolicy) -> Self {
        Self {
            sink,
            policy,
            retries: 0,
        }
    }

    /// Execute one statement, retrying transient failures.
    pub async fn execute(&mut self, sql: &str) -> SinkResult<()> {
        self.call(Call::Execute(sql)).await.map(|_| ())
    }

    /// Insert one batch, retrying transient failures.
    pub async fn batch_insert(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> SinkResult<u64> {
        self.call(Call::Insert {
            table,
            columns,
            rows,
        })
        .await
    }

    /// Total retries performed so far.
    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Release the session and hand back the sink.
    pub async fn close(mut self) -> (S, SinkResult<()>) {
        let result = self.sink.close().await;
        match &result {
            Ok(()) => debug!(retries = self.retries, "warehouse session closed"),
            Err(e) => warn!(error = %e, "failed to close warehouse session"),
        }
        (self.sink, result)
    }

    async fn call(&mut self, call: Call<'_>) -> SinkResult<u64> {
        let mut attempt = 1;
        loop {
            let result = match &call {
                Call::Execute(sql) => self.sink.execute(sql).await.map(|()| 0),
                Call::Insert {
                    table,
                    columns,
                    rows,
                } => self.sink.batch_insert(table, columns, rows).await,
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient warehouse error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    self.retries += 1;
                }
                other => return other,
            }
        }
    }
}
