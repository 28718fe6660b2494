//! Ports (trait interfaces) between the domain and its adapters.

pub mod agent_driver;
pub mod agent_repository;
pub mod memory_store;
pub mod objective_repository;
pub mod session_repository;
pub mod swarm_repository;
pub mod task_repository;

pub use agent_driver::{
    AgentDriver, ChunkKind, DriverChunk, DriverMetadata, DriverStream, Invocation,
};
pub use agent_repository::AgentRepository;
pub use memory_store::MemoryStore;
pub use objective_repository::ObjectiveRepository;
pub use session_repository::SessionRepository;
pub use swarm_repository::SwarmRepository;
pub use task_repository::{TaskFilter, TaskRepository};
