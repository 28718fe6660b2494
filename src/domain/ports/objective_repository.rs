//! Objective repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Objective;

/// Repository interface for Objective persistence.
#[async_trait]
pub trait ObjectiveRepository: Send + Sync {
    async fn create(&self, objective: &Objective) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Objective>>;

    async fn update(&self, objective: &Objective) -> DomainResult<()>;

    async fn list_by_swarm(&self, swarm_id: Uuid) -> DomainResult<Vec<Objective>>;
}
