//! Session domain model.
//!
//! A session is the durable handle to one run of one swarm on one
//! objective: the unit of pause, resume, export and archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Session lifecycle status.
///
/// Initial state is `active`. `completed` and `stopped` are terminal
/// only until a resume; archival removes the session entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Stopped,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl SessionStatus {
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

    /// Every persisted status may be resumed; a `stopped` resume is a
    /// restart. Archived sessions are gone and never reach this check.
    pub fn can_resume(&self) -> bool {
        true
    }
}

/// Severity of a session log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Append-only event record for a session. Ordering is the
/// database-assigned monotonic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    pub id: i64,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub log_level: LogLevel,
    pub message: String,
    pub agent_id: Option<Uuid>,
    pub data: Option<serde_json::Value>,
}

/// A named snapshot within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub session_id: String,
    pub name: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(session_id: impl Into<String>, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            name: name.into(),
            data,
            created_at: Utc::now(),
        }
    }
}

/// A durable handle to one run of one swarm on one objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub swarm_id: Uuid,
    pub swarm_name: String,
    pub objective: Option<String>,
    pub status: SessionStatus,
    /// Pid of the process that owns this session. Liveness-probed by
    /// orphan cleanup.
    pub parent_pid: i32,
    /// Child worker pids. Set semantics; only the session manager mutates.
    pub child_pids: Vec<i32>,
    /// Latest checkpoint payload, duplicated here for one-read resume.
    pub checkpoint_data: Option<serde_json::Value>,
    pub completion_percentage: u8,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(swarm_id: Uuid, swarm_name: impl Into<String>, objective: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("session-{}", Uuid::new_v4()),
            swarm_id,
            swarm_name: swarm_name.into(),
            objective,
            status: SessionStatus::default(),
            parent_pid: std::process::id() as i32,
            child_pids: Vec::new(),
            checkpoint_data: None,
            completion_percentage: 0,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            paused_at: None,
            resumed_at: None,
            completed_at: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Pause. Idempotent: pausing a paused session is a no-op.
    pub fn pause(&mut self) {
        if self.status == SessionStatus::Paused {
            return;
        }
        self.status = SessionStatus::Paused;
        self.paused_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Resume to active, returning how long the session was paused when
    /// a `paused_at` stamp exists.
    pub fn resume(&mut self) -> Option<chrono::Duration> {
        let paused_duration = self.paused_at.map(|p| Utc::now() - p);
        self.status = SessionStatus::Active;
        self.resumed_at = Some(Utc::now());
        self.paused_at = None;
        self.updated_at = Utc::now();
        paused_duration
    }

    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.completion_percentage = 100;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn stop(&mut self) {
        self.status = SessionStatus::Stopped;
        self.updated_at = Utc::now();
    }

    /// Add a child pid. Idempotent over the pid.
    pub fn add_child_pid(&mut self, pid: i32) {
        if !self.child_pids.contains(&pid) {
            self.child_pids.push(pid);
            self.updated_at = Utc::now();
        }
    }

    /// Remove a child pid. Unknown pids succeed silently.
    pub fn remove_child_pid(&mut self, pid: i32) {
        self.child_pids.retain(|p| *p != pid);
        self.updated_at = Utc::now();
    }
}

/// Aggregated counters recomputed on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatistics {
    pub total_agents: usize,
    pub active_agents: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub completion_percentage: u8,
}

impl SessionStatistics {
    /// `round(100 * completed / total)`, 0 when there are no tasks.
    pub fn percentage(completed: usize, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let pct = ((completed as f64 / total as f64) * 100.0).round() as u8;
        pct
    }
}

/// Full serialized session graph, used by export, import and archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    #[serde(flatten)]
    pub session: Session,
    pub swarm: crate::domain::models::Swarm,
    pub agents: Vec<crate::domain::models::Agent>,
    pub tasks: Vec<crate::domain::models::Task>,
    pub checkpoints: Vec<Checkpoint>,
    #[serde(rename = "recentLogs")]
    pub recent_logs: Vec<SessionLog>,
    pub statistics: SessionStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Uuid::new_v4(), "Test Swarm", Some("build it".into()))
    }

    #[test]
    fn test_new_session_is_active_with_parent_pid() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.parent_pid, std::process::id() as i32);
        assert!(s.child_pids.is_empty());
        assert!(s.id.starts_with("session-"));
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut s = session();
        s.pause();
        let first_pause = s.paused_at;
        s.pause();
        assert_eq!(s.paused_at, first_pause);
        assert_eq!(s.status, SessionStatus::Paused);
    }

    #[test]
    fn test_resume_records_paused_duration() {
        let mut s = session();
        s.pause();
        let dur = s.resume();
        assert!(dur.is_some());
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.resumed_at.is_some());
        assert!(s.paused_at.is_none());
    }

    #[test]
    fn test_resume_from_stopped_has_no_paused_duration() {
        let mut s = session();
        s.stop();
        let dur = s.resume();
        assert!(dur.is_none());
        assert_eq!(s.status, SessionStatus::Active);
    }

    #[test]
    fn test_complete_pins_percentage() {
        let mut s = session();
        s.completion_percentage = 40;
        s.complete();
        assert_eq!(s.completion_percentage, 100);
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn test_child_pid_set_semantics() {
        let mut s = session();
        s.add_child_pid(100);
        s.add_child_pid(100);
        assert_eq!(s.child_pids, vec![100]);
        s.remove_child_pid(100);
        s.remove_child_pid(999); // Unknown pid succeeds
        assert!(s.child_pids.is_empty());
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(SessionStatistics::percentage(0, 0), 0);
        assert_eq!(SessionStatistics::percentage(2, 5), 40);
        assert_eq!(SessionStatistics::percentage(1, 3), 33);
        assert_eq!(SessionStatistics::percentage(2, 3), 67);
        assert_eq!(SessionStatistics::percentage(3, 3), 100);
    }
}
