//! JSON-RPC over a spawned process's stdin/stdout.
//!
//! Requests are written as newline-delimited JSON. A reader task routes
//! responses to waiting callers by request id; stderr is drained into the
//! debug log so a chatty server can never block on a full pipe.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use toolgate_core::TransportError;
use tracing::debug;

use super::peer::RpcTransport;
use super::protocol::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};
use crate::path::{build_effective_path, validate_exe_path, validate_working_dir};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcMessage>>>>;

/// How long `close` waits for the child to exit after stdin is closed.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Process spawn parameters for a stdio server.
pub struct StdioSpawn<'a> {
    pub command: &'a str,
    pub args: &'a [String],
    pub env: &'a BTreeMap<String, String>,
    pub working_dir: Option<&'a str>,
    pub path_extra: Option<&'a str>,
}

/// Transport over a child process.
pub struct StdioTransport {
    server_id: String,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    pending: PendingMap,
    next_id: AtomicU64,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl StdioTransport {
    /// Spawn the server process and start the response reader.
    pub fn spawn(
        server_id: &str,
        spawn: &StdioSpawn<'_>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        // Absolute paths are checked up front; bare names are resolved via PATH.
        if Path::new(spawn.command).is_absolute() {
            validate_exe_path(spawn.command).map_err(TransportError::Spawn)?;
        }
        if let Some(dir) = spawn.working_dir {
            validate_working_dir(dir).map_err(TransportError::Spawn)?;
        }

        let effective_path = build_effective_path(spawn.command, spawn.path_extra);

        let mut command = Command::new(spawn.command);
        command
            .args(spawn.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PATH", &effective_path)
            .kill_on_drop(true);

        if let Some(dir) = spawn.working_dir {
            command.current_dir(dir);
        }

        // User-provided environment wins over the computed PATH.
        for (key, value) in spawn.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| {
            let effective_path_str = effective_path.to_string_lossy();
            TransportError::Spawn(format!(
                "Failed to spawn '{}': {e}\nArgs: {:?}\nCwd: {:?}\nEffective PATH: {effective_path_str}",
                spawn.command, spawn.args, spawn.working_dir
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("Failed to get stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            let server_id = server_id.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server_id = %server_id, line = %line, "Server stderr");
                }
            });
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_responses(
            server_id.to_string(),
            stdout,
            Arc::clone(&pending),
        ));

        Ok(Self {
            server_id: server_id.to_string(),
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            reader,
        })
    }

    async fn write_line(&self, line: String) -> Result<(), TransportError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Route responses from stdout to waiting requests until EOF.
async fn read_responses(server_id: String, stdout: ChildStdout, pending: PendingMap) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(server_id = %server_id, error = %e, "Stdout read failed");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Launchers like npx may print banners before the server starts.
        let Ok(message) = serde_json::from_str::<JsonRpcMessage>(trimmed) else {
            debug!(server_id = %server_id, line = trimmed, "Skipping non-JSON-RPC output");
            continue;
        };

        match message.response_id() {
            Some(id) => {
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(message);
                } else {
                    debug!(server_id = %server_id, id, "Response for unknown request");
                }
            }
            None => {
                debug!(
                    server_id = %server_id,
                    method = message.method.as_deref().unwrap_or(""),
                    "Ignoring server-initiated message"
                );
            }
        }
    }

    // Dropping the senders wakes every waiter with a closed-channel error.
    pending.lock().await.clear();
    debug!(server_id = %server_id, "Server stdout closed");
}

#[async_trait]
impl RpcTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.write_line(line).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(message)) => message.into_result(),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                debug!(server_id = %self.server_id, method, id, "Request timed out");
                Err(TransportError::Timeout)
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), TransportError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.write_line(line).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Drop stdin to signal EOF
        self.stdin.lock().await.take();
        self.reader.abort();
        // The aborted reader can no longer fail waiters; do it here.
        self.pending.lock().await.clear();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(server_id = %self.server_id, %status, "Server process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                child.kill().await?;
                debug!(server_id = %self.server_id, "Server process killed after grace period");
                Ok(())
            }
        }
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
