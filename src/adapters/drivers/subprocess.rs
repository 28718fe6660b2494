//! Subprocess agent driver.
//!
//! Spawns a helper process and streams its stdout/stderr as chunks.
//! Every invocation receives a unique, process-local cache directory via
//! environment variables so that nested package-manager invocations
//! cannot race each other on a shared cache. The directory is removed
//! when the invocation finishes.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    AgentDriver, DriverChunk, DriverMetadata, DriverStream, Invocation,
};

/// How the helper process is launched.
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Base directory under which per-invocation cache dirs are created.
    pub cache_root: PathBuf,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            args: Vec::new(),
            cache_root: std::env::temp_dir().join("hivemind-cache"),
        }
    }
}

pub struct SubprocessDriver {
    config: SubprocessConfig,
    cancel_tx: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

impl SubprocessDriver {
    pub fn new(config: SubprocessConfig) -> Self {
        Self {
            config,
            cancel_tx: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl AgentDriver for SubprocessDriver {
    async fn invoke(&self, invocation: Invocation) -> DomainResult<DriverStream> {
        if invocation.instructions.trim().is_empty() {
            return Err(DomainError::InvalidInstructions(
                "empty instructions".to_string(),
            ));
        }

        // Unique cache dir per invocation; env isolation for nested
        // package executions.
        let cache_dir = self
            .config
            .cache_root
            .join(format!("task-{}", invocation.task_id));
        tokio::fs::create_dir_all(&cache_dir).await?;

        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .env("HIVEMIND_TASK_ID", invocation.task_id.to_string())
            .env("HIVEMIND_AGENT_ID", invocation.agent_id.to_string())
            .env("XDG_CACHE_HOME", &cache_dir)
            .env("NPM_CONFIG_CACHE", cache_dir.join("npm"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(invocation.instructions.as_bytes()).await?;
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (cancel_send, mut cancel_rx) = watch::channel(false);
        {
            let mut slot = self.cancel_tx.lock().await;
            *slot = Some(cancel_send);
        }

        let (chunk_tx, chunk_rx) = mpsc::channel::<DriverChunk>(64);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tokio::spawn(async move {
            let stdout_task = stdout.map(|s| {
                let tx = chunk_tx.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(s).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let _ = tx.send(DriverChunk::stdout(line)).await;
                    }
                })
            });
            let stderr_task = stderr.map(|s| {
                let tx = chunk_tx.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(s).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let _ = tx.send(DriverChunk::stderr(line)).await;
                    }
                })
            });
            drop(chunk_tx);

            // `None` marks cancellation; the wait future is dropped
            // before the child is killed and reaped.
            let waited = tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel_rx.changed() => None,
            };
            let outcome = match waited {
                Some(Ok(status)) if status.success() => Ok(()),
                Some(Ok(status)) => Err(DomainError::DriverExitedNonZero {
                    code: status.code().unwrap_or(-1),
                }),
                Some(Err(e)) => Err(DomainError::DriverPanic(e.to_string())),
                None => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    Err(DomainError::DriverPanic("cancelled".to_string()))
                }
            };

            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }

            // Invocation-scoped cache dir is removed afterward.
            let _ = tokio::fs::remove_dir_all(&cache_dir).await;

            let _ = outcome_tx.send(outcome);
        });

        Ok(DriverStream {
            chunks: chunk_rx,
            outcome: outcome_rx,
        })
    }

    async fn cancel(&self) -> DomainResult<()> {
        let slot = self.cancel_tx.lock().await;
        if let Some(tx) = slot.as_ref() {
            let _ = tx.send(true);
        }
        Ok(())
    }

    fn metadata(&self) -> DriverMetadata {
        DriverMetadata {
            driver_type: "subprocess".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
