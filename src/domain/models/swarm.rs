//! Swarm domain model.
//!
//! A swarm is a named collection of agents pursuing one or more objectives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dispatch policy among coordinator and agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmTopology {
    /// One queen dispatches to workers; coordinator-type workers act as sub-queens.
    Hierarchical,
    /// Any idle agent may steal a ready task via an atomic claim.
    Mesh,
    /// Coordinator is the hub; agents pull one task each and return.
    Star,
    /// One coordinator process picks for all agents.
    Centralized,
    /// Work-stealing, same claim discipline as mesh.
    Distributed,
}

impl Default for SwarmTopology {
    fn default() -> Self {
        Self::Hierarchical
    }
}

impl SwarmTopology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hierarchical => "hierarchical",
            Self::Mesh => "mesh",
            Self::Star => "star",
            Self::Centralized => "centralized",
            Self::Distributed => "distributed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hierarchical" => Some(Self::Hierarchical),
            "mesh" => Some(Self::Mesh),
            "star" => Some(Self::Star),
            "centralized" => Some(Self::Centralized),
            "distributed" => Some(Self::Distributed),
            _ => None,
        }
    }

    /// Whether agents claim tasks themselves instead of being picked by
    /// the coordinator.
    pub fn is_work_stealing(&self) -> bool {
        matches!(self, Self::Mesh | Self::Distributed)
    }
}

/// Queen scheduling strategy. All variants currently schedule
/// FIFO-by-priority; the distinction is persisted as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueenType {
    Strategic,
    Tactical,
    Adaptive,
}

impl Default for QueenType {
    fn default() -> Self {
        Self::Strategic
    }
}

impl QueenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strategic => "strategic",
            Self::Tactical => "tactical",
            Self::Adaptive => "adaptive",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strategic" => Some(Self::Strategic),
            "tactical" => Some(Self::Tactical),
            "adaptive" => Some(Self::Adaptive),
            _ => None,
        }
    }
}

/// Swarm lifecycle status. Mirrors the owning session's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmStatus {
    Active,
    Paused,
    Completed,
    Stopped,
}

impl Default for SwarmStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl SwarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// A named group of cooperating agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swarm {
    pub id: Uuid,
    pub name: String,
    pub topology: SwarmTopology,
    pub queen_type: QueenType,
    pub status: SwarmStatus,
    pub max_workers: u32,
    pub created_at: DateTime<Utc>,
}

impl Swarm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            topology: SwarmTopology::default(),
            queen_type: QueenType::default(),
            status: SwarmStatus::default(),
            max_workers: 8,
            created_at: Utc::now(),
        }
    }

    pub fn with_topology(mut self, topology: SwarmTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_queen_type(mut self, queen_type: QueenType) -> Self {
        self.queen_type = queen_type;
        self
    }

    pub fn with_max_workers(mut self, max_workers: u32) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Swarm name cannot be empty".to_string());
        }
        if self.max_workers == 0 {
            return Err("Swarm must allow at least one worker".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swarm_creation_defaults() {
        let swarm = Swarm::new("Test Swarm");
        assert_eq!(swarm.name, "Test Swarm");
        assert_eq!(swarm.topology, SwarmTopology::Hierarchical);
        assert_eq!(swarm.queen_type, QueenType::Strategic);
        assert_eq!(swarm.status, SwarmStatus::Active);
        assert_eq!(swarm.max_workers, 8);
    }

    #[test]
    fn test_topology_roundtrip() {
        for t in [
            SwarmTopology::Hierarchical,
            SwarmTopology::Mesh,
            SwarmTopology::Star,
            SwarmTopology::Centralized,
            SwarmTopology::Distributed,
        ] {
            assert_eq!(SwarmTopology::from_str(t.as_str()), Some(t));
        }
        assert_eq!(SwarmTopology::from_str("ring"), None);
    }

    #[test]
    fn test_work_stealing_topologies() {
        assert!(SwarmTopology::Mesh.is_work_stealing());
        assert!(SwarmTopology::Distributed.is_work_stealing());
        assert!(!SwarmTopology::Hierarchical.is_work_stealing());
        assert!(!SwarmTopology::Star.is_work_stealing());
        assert!(!SwarmTopology::Centralized.is_work_stealing());
    }

    #[test]
    fn test_swarm_validation() {
        assert!(Swarm::new("ok").validate().is_ok());
        assert!(Swarm::new("  ").validate().is_err());
        assert!(Swarm::new("ok").with_max_workers(0).validate().is_err());
    }
}
