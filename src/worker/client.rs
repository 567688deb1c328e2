//! Async client for communicating with the warehouse worker process.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use super::error::{WorkerError, WorkerResult};
use super::protocol::{
    codes, methods, BatchInsertParams, BatchInsertResponse, CloseParams, CloseResponse,
    ConnectParams, ConnectResponse, ErrorInfo, ExecuteParams, ExecuteResponse, RequestEnvelope,
    ResponseEnvelope,
};
use crate::config::WarehouseConnection;
use crate::sql::Row;

/// How long to wait for the worker to exit after its stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>;

/// Async client for the warehouse worker.
///
/// The client spawns the worker as a child process and communicates via
/// NDJSON (newline-delimited JSON) over stdin/stdout. Each request has a
/// unique ID for correlation with responses.
///
/// # Example
///
/// ```ignore
/// use birdload::worker::WorkerClient;
///
/// let client = WorkerClient::spawn("bird-warehouse-worker", &[], timeout).await?;
/// let session = client.connect(&connection).await?;
/// client.execute(&session.session_id, "SELECT 1").await?;
/// client.close(&session.session_id).await?;
/// client.shutdown().await;
/// ```
pub struct WorkerClient {
    /// Writer for sending requests to worker stdin.
    stdin: Arc<Mutex<BufWriter<ChildStdin>>>,

    /// Map of pending request IDs to response channels.
    pending: PendingMap,

    /// Handle to the worker child process.
    child: Child,

    /// Handle to the background reader task.
    reader_task: tokio::task::JoinHandle<()>,

    /// Request timeout duration.
    timeout: Duration,
}

impl WorkerClient {
    /// Spawn a new worker process.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker process cannot be spawned.
    pub async fn spawn<P: AsRef<Path>>(
        worker_path: P,
        args: &[String],
        timeout: Duration,
    ) -> WorkerResult<Self> {
        let worker_path = worker_path.as_ref();
        let mut child = Command::new(worker_path)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or_else(|| not_captured("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| not_captured("stdout"))?;

        let stdin = Arc::new(Mutex::new(BufWriter::new(stdin)));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = Self::spawn_reader_task(stdout, pending.clone());
        debug!(worker = %worker_path.display(), "spawned warehouse worker");

        Ok(Self {
            stdin,
            pending,
            child,
            reader_task,
            timeout,
        })
    }

    /// Spawn the background task that reads responses from the worker.
    fn spawn_reader_task(stdout: ChildStdout, pending: PendingMap) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    // EOF - worker exited
                    Ok(0) => break,
                    Ok(_) => match serde_json::from_str::<ResponseEnvelope>(&line) {
                        Ok(resp) => {
                            let mut pending = pending.lock().await;
                            if let Some(tx) = pending.remove(&resp.id) {
                                let _ = tx.send(resp);
                            } else {
                                warn!(id = %resp.id, "worker response for unknown request");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse worker response");
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "worker read error");
                        break;
                    }
                }
            }

            // Worker exited - notify all pending requests with error responses
            let mut pending = pending.lock().await;
            for (id, tx) in pending.drain() {
                let error_response = ResponseEnvelope {
                    id,
                    success: false,
                    result: None,
                    error: Some(ErrorInfo {
                        code: codes::WORKER_EXITED.to_string(),
                        message: "Worker process exited unexpectedly".to_string(),
                    }),
                };
                let _ = tx.send(error_response);
            }
        })
    }

    /// Send a request to the worker and wait for a response.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Serialization fails
    /// - Writing to the worker fails
    /// - The request times out
    /// - The worker returns an error response
    /// - Deserialization of the response fails
    pub async fn request<P, R>(&self, method: &str, params: P) -> WorkerResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = uuid::Uuid::new_v4().to_string();

        let request = RequestEnvelope {
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params).map_err(WorkerError::SerializeFailed)?,
        };

        // Register response channel
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        // Send request
        {
            let mut stdin = self.stdin.lock().await;
            let line =
                serde_json::to_string(&request).map_err(WorkerError::SerializeFailed)? + "\n";
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(WorkerError::WriteFailed)?;
            stdin.flush().await.map_err(WorkerError::WriteFailed)?;
        }

        // Wait for response with timeout
        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(resp) => resp?,
            Err(_) => {
                // Timeout - clean up pending request to prevent memory leak
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(WorkerError::Timeout(self.timeout.as_secs()));
            }
        };

        if response.success {
            let result = response.result.unwrap_or(serde_json::Value::Null);
            serde_json::from_value(result).map_err(WorkerError::DeserializeFailed)
        } else {
            let error = response.error.unwrap_or_else(|| ErrorInfo {
                code: "UNKNOWN".to_string(),
                message: "Unknown error".to_string(),
            });
            Err(WorkerError::from_code(&error.code, &error.message))
        }
    }

    /// Check if the worker is still running.
    ///
    /// Returns `false` once the reader task has finished (worker exit).
    pub fn is_alive(&self) -> bool {
        !self.reader_task.is_finished()
    }

    /// Close stdin and wait briefly for the worker to exit, killing it
    /// otherwise.
    pub async fn shutdown(mut self) {
        drop(self.stdin);
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "warehouse worker exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for warehouse worker"),
            Err(_) => {
                warn!("warehouse worker did not exit, killing it");
                let _ = self.child.kill().await;
            }
        }
        self.reader_task.abort();
    }
}

// Convenience methods for the warehouse protocol
impl WorkerClient {
    /// Open a warehouse session.
    pub async fn connect(&self, connection: &WarehouseConnection) -> WorkerResult<ConnectResponse> {
        self.request(methods::CONNECT, ConnectParams { connection })
            .await
    }

    /// Execute one SQL statement.
    pub async fn execute(&self, session_id: &str, sql: &str) -> WorkerResult<ExecuteResponse> {
        self.request(methods::EXECUTE, ExecuteParams { session_id, sql })
            .await
    }

    /// Insert rows into an existing table.
    pub async fn batch_insert(
        &self,
        session_id: &str,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> WorkerResult<BatchInsertResponse> {
        self.request(
            methods::BATCH_INSERT,
            BatchInsertParams {
                session_id,
                table,
                columns,
                rows,
            },
        )
        .await
    }

    /// Close a warehouse session.
    pub async fn close(&self, session_id: &str) -> WorkerResult<CloseResponse> {
        self.request(methods::CLOSE, CloseParams { session_id }).await
    }
}

fn not_captured(stream: &str) -> WorkerError {
    WorkerError::SpawnFailed(io::Error::new(
        io::ErrorKind::Other,
        format!("worker {stream} not captured"),
    ))
}
