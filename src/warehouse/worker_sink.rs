//! Snowflake sink backed by the warehouse worker process.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{SinkError, SinkResult, WarehouseSink};
use crate::config::{Settings, WarehouseConnection};
use crate::sql::Row;
use crate::worker::{WorkerClient, WorkerError};

/// Live warehouse sink.
///
/// Owns the worker process and one warehouse session inside it.
pub struct WorkerSink {
    client: Option<WorkerClient>,
    session_id: String,
}

impl WorkerSink {
    /// Spawn the worker and open a session.
    ///
    /// Any failure here is a [`SinkError::Connection`].
    pub async fn connect(settings: &Settings) -> SinkResult<Self> {
        let connection = settings
            .warehouse_connection()
            .map_err(|e| SinkError::Connection(e.to_string()))?;
        let worker_path = settings
            .worker_path()
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        let client = WorkerClient::spawn(
            &worker_path,
            &settings.worker.args,
            settings.worker.timeout(),
        )
        .await
        .map_err(|e| SinkError::Connection(e.to_string()))?;

        Self::open(client, &connection).await
    }

    /// Open a session on an already running worker.
    pub async fn open(client: WorkerClient, connection: &WarehouseConnection) -> SinkResult<Self> {
        let response = match client.connect(connection).await {
            Ok(response) => response,
            Err(e) => {
                client.shutdown().await;
                return Err(SinkError::Connection(e.to_string()));
            }
        };

        info!(
            account = %connection.account,
            database = %connection.database,
            schema = %connection.schema,
            server_version = response.server_version.as_deref().unwrap_or("unknown"),
            "connected to warehouse"
        );

        Ok(Self {
            client: Some(client),
            session_id: response.session_id,
        })
    }

    fn client(&self) -> SinkResult<&WorkerClient> {
        match &self.client {
            Some(client) if client.is_alive() => Ok(client),
            Some(_) => Err(WorkerError::WorkerExited.into()),
            None => Err(SinkError::Connection("session already closed".to_string())),
        }
    }
}

#[async_trait]
impl WarehouseSink for WorkerSink {
    async fn execute(&mut self, sql: &str) -> SinkResult<()> {
        self.client()?.execute(&self.session_id, sql).await?;
        Ok(())
    }

    async fn batch_insert(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> SinkResult<u64> {
        let response = self
            .client()?
            .batch_insert(&self.session_id, table, columns, rows)
            .await?;
        Ok(response.rows_inserted)
    }

    async fn close(&mut self) -> SinkResult<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        let result = client.close(&self.session_id).await;
        client.shutdown().await;
        debug!(session_id = %self.session_id, "warehouse session released");
        result.map(|_| ()).map_err(SinkError::from)
    }
}

impl From<WorkerError> for SinkError {
    fn from(err: WorkerError) -> Self {
        match &err {
            // The worker may still be executing a request the client gave up
            // on, so a client-side timeout ends the session.
            WorkerError::Timeout(_) => SinkError::Connection(err.to_string()),
            WorkerError::StatementTimeout(_) => SinkError::Timeout(err.to_string()),
            WorkerError::Throttled(_) => SinkError::Throttled(err.to_string()),
            e if e.is_connection_lost() => SinkError::Connection(err.to_string()),
            _ => SinkError::Permanent(err.to_string()),
        }
    }
}
