//! Agent driver port.
//!
//! The executor does not know how an agent performs work. A driver turns
//! task instructions into a stream of output chunks: subprocess, HTTP
//! service, or in-process for tests.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::domain::errors::DomainResult;

/// Which stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Stdout,
    Stderr,
}

/// One unit of driver output.
#[derive(Debug, Clone)]
pub struct DriverChunk {
    pub kind: ChunkKind,
    pub data: String,
}

impl DriverChunk {
    pub fn stdout(data: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Stdout,
            data: data.into(),
        }
    }

    pub fn stderr(data: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Stderr,
            data: data.into(),
        }
    }
}

/// Audit metadata for a driver.
#[derive(Debug, Clone)]
pub struct DriverMetadata {
    pub driver_type: String,
    pub version: String,
}

/// Everything a driver needs to run one task on one agent.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub task_id: Uuid,
    pub agent_id: Uuid,
    pub instructions: String,
}

/// Lazy output of a running invocation: chunks close on completion, then
/// `outcome` resolves with the classified exit result.
#[derive(Debug)]
pub struct DriverStream {
    pub chunks: mpsc::Receiver<DriverChunk>,
    pub outcome: oneshot::Receiver<DomainResult<()>>,
}

/// Pluggable mechanism that actually executes a task.
#[async_trait]
pub trait AgentDriver: Send + Sync {
    /// Start executing the instructions; returns the output stream.
    async fn invoke(&self, invocation: Invocation) -> DomainResult<DriverStream>;

    /// Requested by the executor on timeout or external cancellation.
    async fn cancel(&self) -> DomainResult<()>;

    fn metadata(&self) -> DriverMetadata;
}
