//! Swarm event bus.
//!
//! The coordinator and executor publish events on a broadcast channel;
//! the auto-save middleware subscribes. Explicit channels, no global bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events published by the coordinator and executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SwarmEvent {
    SwarmInitialized {
        swarm_id: Uuid,
        name: String,
    },
    AgentSpawned {
        agent_id: Uuid,
        name: String,
        agent_type: String,
    },
    AgentFailed {
        agent_id: Uuid,
        error: String,
    },
    ObjectiveCreated {
        objective_id: Uuid,
        task_count: usize,
    },
    ObjectiveCompleted {
        objective_id: Uuid,
        failed: bool,
    },
    TaskAssigned {
        task_id: Uuid,
        agent_id: Uuid,
    },
    TaskStarted {
        task_id: Uuid,
        agent_id: Uuid,
    },
    TaskProgress {
        task_id: Uuid,
        progress: u8,
    },
    TaskCompleted {
        task_id: Uuid,
        duration_ms: u64,
    },
    TaskFailed {
        task_id: Uuid,
        error: String,
        attempt: u32,
    },
    TaskRetrying {
        task_id: Uuid,
        attempt: u32,
        backoff_ms: u64,
    },
    MemoryUpdated {
        namespace: String,
        key: String,
    },
    ConsensusReached {
        topic: String,
    },
}

impl SwarmEvent {
    /// Stable kind string for change tracking and session events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SwarmInitialized { .. } => "swarm_initialized",
            Self::AgentSpawned { .. } => "agent_spawned",
            Self::AgentFailed { .. } => "agent_failed",
            Self::ObjectiveCreated { .. } => "objective_created",
            Self::ObjectiveCompleted { .. } => "objective_completed",
            Self::TaskAssigned { .. } => "task_assigned",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskProgress { .. } => "task_progress",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskRetrying { .. } => "task_retrying",
            Self::MemoryUpdated { .. } => "memory_updated",
            Self::ConsensusReached { .. } => "consensus_reached",
        }
    }

    /// Kinds whose arrival triggers an immediate auto-save flush.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::TaskCompleted { .. } | Self::AgentSpawned { .. } | Self::ConsensusReached { .. }
        )
    }
}

/// Timestamped envelope broadcast to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: SwarmEvent,
}

/// Fan-out channel for swarm events.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Lack of subscribers is not an error.
    pub fn publish(&self, event: SwarmEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        let _ = self.sender.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
