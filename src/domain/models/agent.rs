//! Agent domain model.
//!
//! Agents are workers registered with a swarm. The coordinator moves them
//! between idle and active; the executor moves them through busy and back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an agent within a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Coordinates its sub-tree under hierarchical topology.
    Queen,
    Worker,
}

impl Default for AgentRole {
    fn default() -> Self {
        Self::Worker
    }
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queen => "queen",
            Self::Worker => "worker",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "queen" => Some(Self::Queen),
            "worker" => Some(Self::Worker),
            _ => None,
        }
    }
}

/// Status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered and available for assignment.
    Idle,
    /// Assigned a task, not yet executing.
    Active,
    /// Executing a task.
    Busy,
    /// Last execution failed; requires coordinator intervention.
    Failed,
    /// Removed on swarm shutdown.
    Terminated,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "active" => Some(Self::Active),
            "busy" => Some(Self::Busy),
            "failed" => Some(Self::Failed),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [AgentStatus] {
        match self {
            Self::Idle => &[Self::Active, Self::Failed, Self::Terminated],
            Self::Active => &[Self::Busy, Self::Idle, Self::Failed, Self::Terminated],
            Self::Busy => &[Self::Idle, Self::Failed, Self::Terminated],
            Self::Failed => &[Self::Idle, Self::Terminated],
            Self::Terminated => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }

    /// Whether the agent can accept a new task.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Resource budget for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResources {
    pub cpu_budget: f64,
    pub memory_budget_mb: u32,
    pub max_concurrent_tasks: u32,
}

impl Default for AgentResources {
    fn default() -> Self {
        Self {
            cpu_budget: 1.0,
            memory_budget_mb: 512,
            max_concurrent_tasks: 1,
        }
    }
}

/// A worker registered with a swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub swarm_id: Uuid,
    pub name: String,
    /// Semantic type (researcher, coder, tester, analyst, coordinator, ...).
    pub agent_type: String,
    pub role: AgentRole,
    /// Opaque capability tags matched against task types at assignment.
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    pub current_task_id: Option<Uuid>,
    pub resources: AgentResources,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(swarm_id: Uuid, name: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            swarm_id,
            name: name.into(),
            agent_type: agent_type.into(),
            role: AgentRole::default(),
            capabilities: Vec::new(),
            status: AgentStatus::default(),
            current_task_id: None,
            resources: AgentResources::default(),
            created_at: Utc::now(),
            last_heartbeat: None,
        }
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_resources(mut self, resources: AgentResources) -> Self {
        self.resources = resources;
        self
    }

    /// Transition to a new status, enforcing the state machine.
    pub fn transition_to(&mut self, new_status: AgentStatus) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition agent from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        if matches!(new_status, AgentStatus::Idle | AgentStatus::Failed) {
            self.current_task_id = None;
        }
        Ok(())
    }

    /// Whether this agent advertises a capability matching the tag.
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new(Uuid::new_v4(), "worker-1", "coder")
    }

    #[test]
    fn test_agent_defaults() {
        let a = agent();
        assert_eq!(a.status, AgentStatus::Idle);
        assert_eq!(a.role, AgentRole::Worker);
        assert_eq!(a.resources.max_concurrent_tasks, 1);
        assert!(a.current_task_id.is_none());
    }

    #[test]
    fn test_agent_lifecycle_transitions() {
        let mut a = agent();
        a.transition_to(AgentStatus::Active).unwrap();
        a.transition_to(AgentStatus::Busy).unwrap();
        a.current_task_id = Some(Uuid::new_v4());
        a.transition_to(AgentStatus::Idle).unwrap();
        // Returning to idle clears the current task.
        assert!(a.current_task_id.is_none());
    }

    #[test]
    fn test_invalid_agent_transitions() {
        let mut a = agent();
        // Idle -> Busy must go through Active.
        assert!(a.transition_to(AgentStatus::Busy).is_err());

        a.transition_to(AgentStatus::Terminated).unwrap();
        assert!(a.transition_to(AgentStatus::Idle).is_err());
    }

    #[test]
    fn test_failed_agent_recovers_to_idle() {
        let mut a = agent();
        a.transition_to(AgentStatus::Failed).unwrap();
        assert!(a.transition_to(AgentStatus::Idle).is_ok());
    }

    #[test]
    fn test_capability_match() {
        let a = agent().with_capabilities(vec!["code_generation".into(), "testing".into()]);
        assert!(a.has_capability("code_generation"));
        assert!(!a.has_capability("analysis"));
    }
}
