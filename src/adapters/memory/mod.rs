//! Memory store backends: in-memory and the durable/fallback composite.

pub mod composite;
pub mod in_memory;

pub use composite::{ActiveBackend, CompositeMemoryStore};
pub use in_memory::InMemoryStore;
