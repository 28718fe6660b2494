//! Agent repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentStatus};

/// Repository interface for Agent persistence.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn create(&self, agent: &Agent) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>>;

    async fn update(&self, agent: &Agent) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// Agents of one swarm in insertion order (created_at, then id).
    async fn list_by_swarm(&self, swarm_id: Uuid) -> DomainResult<Vec<Agent>>;

    async fn list_by_status(&self, swarm_id: Uuid, status: AgentStatus) -> DomainResult<Vec<Agent>>;

    /// Atomically set status and current task. Passing `None` clears the
    /// assignment.
    async fn update_status(
        &self,
        id: Uuid,
        status: AgentStatus,
        current_task_id: Option<Uuid>,
    ) -> DomainResult<()>;

    /// Mark every agent of a swarm terminated (swarm shutdown).
    async fn terminate_all(&self, swarm_id: Uuid) -> DomainResult<u64>;
}
