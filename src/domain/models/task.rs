//! Task domain model.
//!
//! Tasks are opaque units of work scheduled by the coordinator and run by
//! the executor. They form a DAG through their dependency edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Status of a task in the scheduling pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Defined; waiting for dependencies and an eligible agent.
    Pending,
    /// Matched to an agent, not yet executing.
    Assigned,
    /// Currently being executed.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Retry budget exhausted or terminal error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Cancelled],
            Self::Assigned => &[Self::InProgress, Self::Pending, Self::Cancelled],
            // InProgress -> Pending is the retry/reschedule path.
            Self::InProgress => &[Self::Completed, Self::Failed, Self::Cancelled, Self::Pending],
            Self::Completed => &[],
            Self::Failed => &[Self::Pending], // Manual or budgeted retry
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Execution constraints: per-task timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConstraints {
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for TaskConstraints {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            max_retries: 3,
        }
    }
}

/// Result recorded on successful execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Captured driver output (bounded by the executor's ring buffer).
    pub output: String,
    /// Named artifacts produced during execution.
    pub artifacts: HashMap<String, serde_json::Value>,
    pub duration_ms: u64,
}

/// An opaque unit of work with a state machine, dependencies, priority
/// and retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub swarm_id: Uuid,
    /// Tasks may be standalone (no objective).
    pub objective_id: Option<Uuid>,
    /// Semantic class of work (coding, analysis, testing, generic, ...).
    pub task_type: String,
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub status: TaskStatus,
    pub priority: i32,
    /// 0..=100, reported by trackers and recomputed on completion.
    pub progress: u8,
    pub assigned_agent_id: Option<Uuid>,
    /// Task ids that must be completed before this one may leave pending.
    pub depends_on: Vec<Uuid>,
    pub constraints: TaskConstraints,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(swarm_id: Uuid, task_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            swarm_id,
            objective_id: None,
            task_type: task_type.into(),
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            status: TaskStatus::default(),
            priority: 0,
            progress: 0,
            assigned_agent_id: None,
            depends_on: Vec::new(),
            constraints: TaskConstraints::default(),
            result: None,
            error: None,
            attempt_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_objective(mut self, objective_id: Uuid) -> Self {
        self.objective_id = Some(objective_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.depends_on.contains(&task_id) && task_id != self.id {
            self.depends_on.push(task_id);
        }
        self
    }

    pub fn with_constraints(mut self, constraints: TaskConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Transition to a new status, enforcing the state machine and
    /// stamping timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        match new_status {
            TaskStatus::InProgress => self.started_at = Some(Utc::now()),
            TaskStatus::Completed => {
                self.completed_at = Some(Utc::now());
                self.progress = 100;
            }
            TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            TaskStatus::Pending => {
                self.assigned_agent_id = None;
            }
            TaskStatus::Assigned => {}
        }
        Ok(())
    }

    /// Force a status, bypassing the state machine. Reserved for crash
    /// recovery, reconciliation, and test setup; every call is logged.
    pub fn force_status(&mut self, new_status: TaskStatus, reason: &str) {
        tracing::warn!(
            task_id = %self.id,
            from = %self.status.as_str(),
            to = %new_status.as_str(),
            reason = reason,
            "Forcing task status transition"
        );
        self.status = new_status;
        match new_status {
            TaskStatus::InProgress => self.started_at = Some(Utc::now()),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the retry budget permits another attempt.
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.constraints.max_retries
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Task name cannot be empty".to_string());
        }
        if self.depends_on.contains(&self.id) {
            return Err("Task cannot depend on itself".to_string());
        }
        if self.progress > 100 {
            return Err("Task progress cannot exceed 100".to_string());
        }
        Ok(())
    }
}
