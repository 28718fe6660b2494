//! Swarm repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Swarm, SwarmStatus};

/// Repository interface for Swarm persistence.
#[async_trait]
pub trait SwarmRepository: Send + Sync {
    async fn create(&self, swarm: &Swarm) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Swarm>>;

    async fn update(&self, swarm: &Swarm) -> DomainResult<()>;

    /// Cascade target for session status changes.
    async fn update_status(&self, id: Uuid, status: SwarmStatus) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<Swarm>>;
}
