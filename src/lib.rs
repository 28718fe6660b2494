//! Hivemind - persistent multi-agent swarm coordination engine.
//!
//! - Swarm coordinator with objective decomposition and dependency-aware
//!   task scheduling
//! - Task executor with timeouts, retries, and output capture
//! - Durable sessions over SQLite with checkpoints, pause/resume, and
//!   orphan cleanup
//! - Auto-save middleware producing periodic and event-triggered
//!   checkpoints
//! - Namespaced key/value memory with TTL and an in-memory fallback

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod services;

// Re-export key types for convenience
pub use adapters::sqlite::initialize_database;
pub use domain::errors::{DomainError, DomainResult};
