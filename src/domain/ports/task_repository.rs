//! Task repository port.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskResult, TaskStatus};

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub swarm_id: Option<Uuid>,
    pub objective_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
    pub limit: Option<usize>,
}

/// Repository interface for Task persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    async fn update(&self, task: &Task) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>>;

    async fn list_by_objective(&self, objective_id: Uuid) -> DomainResult<Vec<Task>>;

    async fn list_by_swarm(&self, swarm_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Full-text-ish search over name and description.
    async fn search(&self, swarm_id: Option<Uuid>, query: &str) -> DomainResult<Vec<Task>>;

    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()>;

    async fn remove_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()>;

    /// Dependency task rows for a task.
    async fn get_dependencies(&self, task_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Atomically claim a pending task for an agent. Returns the claimed
    /// task, or `None` when another worker won the race. The basis of
    /// mesh/distributed work-stealing.
    async fn claim_task(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<Option<Task>>;

    /// Record completion and release the executing agent to idle in one
    /// transaction.
    async fn complete_and_release(
        &self,
        task_id: Uuid,
        agent_id: Uuid,
        result: &TaskResult,
    ) -> DomainResult<()>;

    async fn count_by_status(&self, swarm_id: Uuid) -> DomainResult<HashMap<TaskStatus, u64>>;
}
