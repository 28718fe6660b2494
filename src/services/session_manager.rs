//! Session manager.
//!
//! Owns session lifecycle and durability: creation, checkpoints,
//! pause/resume, stop with child-process teardown, archive,
//! export/import, and orphaned-session cleanup. Every operation
//! persists before returning.

use chrono::Utc;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, AgentRole, AgentStatus, Checkpoint, LogLevel, Session, SessionExport, SessionLog,
    SessionStatistics, SessionStatus, Swarm, SwarmStatus, Task, TaskStatus,
};
use crate::domain::ports::{
    AgentRepository, SessionRepository, SwarmRepository, TaskRepository,
};

/// How long `stop_session` waits for signaled children before giving up.
const STOP_WINDOW: Duration = Duration::from_secs(5);

/// How many log events `get_session` returns.
const RECENT_LOG_WINDOW: usize = 50;

/// Listing row for `get_active_sessions`. The embedded session carries
/// the derived completion percentage.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session: Session,
    pub agent_count: usize,
    pub task_count: usize,
    pub completed_tasks: usize,
    pub completion_percentage: u8,
}

/// Full session graph returned by `get_session`.
#[derive(Debug, Clone, Serialize)]
pub struct FullSession {
    #[serde(flatten)]
    pub session: Session,
    pub swarm: Swarm,
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub checkpoints: Vec<Checkpoint>,
    #[serde(rename = "recentLogs")]
    pub recent_logs: Vec<SessionLog>,
    pub statistics: SessionStatistics,
}

pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    swarms: Arc<dyn SwarmRepository>,
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    sessions_dir: PathBuf,
    archive_dir: PathBuf,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        swarms: Arc<dyn SwarmRepository>,
        agents: Arc<dyn AgentRepository>,
        tasks: Arc<dyn TaskRepository>,
        sessions_dir: PathBuf,
    ) -> Self {
        let archive_dir = sessions_dir.join("archive");
        Self {
            sessions,
            swarms,
            agents,
            tasks,
            sessions_dir,
            archive_dir,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub async fn create_session(
        &self,
        swarm_id: Uuid,
        swarm_name: &str,
        objective: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> DomainResult<String> {
        let session = Session::new(swarm_id, swarm_name, objective).with_metadata(metadata);
        self.sessions.create(&session).await?;
        self.sessions
            .append_log(&session.id, LogLevel::Info, "Session created", None, None)
            .await?;

        tracing::info!(session_id = %session.id, swarm_id = %swarm_id, "Session created");
        Ok(session.id)
    }

    async fn load(&self, session_id: &str) -> DomainResult<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| DomainError::SessionNotFound(session_id.to_string()))
    }

    /// Persist a checkpoint row, mirror the payload on the session row,
    /// and write the sidecar JSON backup used by export/import.
    pub async fn save_checkpoint(
        &self,
        session_id: &str,
        name: &str,
        data: serde_json::Value,
    ) -> DomainResult<Uuid> {
        let mut session = self.load(session_id).await?;

        let checkpoint = Checkpoint::new(session_id, name, data.clone());
        self.sessions.create_checkpoint(&checkpoint).await?;

        session.checkpoint_data = Some(data.clone());
        session.updated_at = Utc::now();
        self.sessions.update(&session).await?;

        tokio::fs::create_dir_all(&self.sessions_dir).await?;
        let sidecar = self.sessions_dir.join(format!("{session_id}-{name}.json"));
        tokio::fs::write(&sidecar, serde_json::to_vec_pretty(&data)?).await?;

        self.sessions
            .append_log(
                session_id,
                LogLevel::Debug,
                &format!("Checkpoint saved: {name}"),
                None,
                None,
            )
            .await?;

        Ok(checkpoint.id)
    }

    pub async fn get_active_sessions(&self) -> DomainResult<Vec<SessionSummary>> {
        let sessions = self
            .sessions
            .list_by_status(&[SessionStatus::Active, SessionStatus::Paused])
            .await?;

        let mut summaries = Vec::with_capacity(sessions.len());
        for mut session in sessions {
            let agents = self.agents.list_by_swarm(session.swarm_id).await?;
            let counts = self.tasks.count_by_status(session.swarm_id).await?;
            let total: u64 = counts.values().sum();
            let completed = counts.get(&TaskStatus::Completed).copied().unwrap_or(0);

            #[allow(clippy::cast_possible_truncation)]
            let completion_percentage =
                SessionStatistics::percentage(completed as usize, total as usize);
            session.completion_percentage = completion_percentage;

            #[allow(clippy::cast_possible_truncation)]
            let summary = SessionSummary {
                completion_percentage,
                agent_count: agents.len(),
                task_count: total as usize,
                completed_tasks: completed as usize,
                session,
            };
            summaries.push(summary);
        }

        Ok(summaries)
    }

    pub async fn get_session(&self, session_id: &str) -> DomainResult<FullSession> {
        let session = self.load(session_id).await?;

        let swarm = self
            .swarms
            .get(session.swarm_id)
            .await?
            .ok_or(DomainError::SwarmNotFound(session.swarm_id))?;
        let agents = self.agents.list_by_swarm(session.swarm_id).await?;
        let tasks = self.tasks.list_by_swarm(session.swarm_id).await?;
        let checkpoints = self.sessions.list_checkpoints(session_id).await?;
        let recent_logs = self
            .sessions
            .recent_logs(session_id, RECENT_LOG_WINDOW)
            .await?;

        let statistics = compute_statistics(&agents, &tasks);

        Ok(FullSession {
            session,
            swarm,
            agents,
            tasks,
            checkpoints,
            recent_logs,
            statistics,
        })
    }

    /// Idempotent pause: an already-paused session succeeds unchanged.
    pub async fn pause_session(&self, session_id: &str) -> DomainResult<()> {
        let mut session = self.load(session_id).await?;
        if session.status == SessionStatus::Paused {
            return Ok(());
        }

        session.pause();
        self.sessions.update(&session).await?;
        self.swarms
            .update_status(session.swarm_id, SwarmStatus::Paused)
            .await?;
        self.sessions
            .append_log(session_id, LogLevel::Info, "Session paused", None, None)
            .await?;

        tracing::info!(session_id = %session_id, "Session paused");
        Ok(())
    }

    /// Resume from any persisted status; a resume of a stopped session is
    /// a restart. Agents are restored so that queens are active and
    /// workers idle; tasks stay in their last persisted state for the
    /// coordinator to re-schedule.
    pub async fn resume_session(&self, session_id: &str) -> DomainResult<Session> {
        let mut session = match self.sessions.get(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(DomainError::SessionNotFound(session_id.to_string())),
            Err(e) => {
                return Err(DomainError::ResumeFailed {
                    session_id: session_id.to_string(),
                    source: Box::new(e),
                })
            }
        };

        let paused_duration = session.resume();
        self.sessions.update(&session).await?;
        self.swarms
            .update_status(session.swarm_id, SwarmStatus::Active)
            .await?;

        for agent in self.agents.list_by_swarm(session.swarm_id).await? {
            let status = if agent.role == AgentRole::Queen {
                AgentStatus::Active
            } else {
                AgentStatus::Idle
            };
            self.agents.update_status(agent.id, status, None).await?;
        }

        let data = paused_duration.map(|d| {
            serde_json::json!({ "pausedDuration": d.num_milliseconds() })
        });
        self.sessions
            .append_log(session_id, LogLevel::Info, "Session resumed", None, data)
            .await?;

        tracing::info!(session_id = %session_id, "Session resumed");
        self.load(session_id).await
    }

    pub async fn complete_session(&self, session_id: &str) -> DomainResult<()> {
        let mut session = self.load(session_id).await?;
        session.complete();
        self.sessions.update(&session).await?;
        self.swarms
            .update_status(session.swarm_id, SwarmStatus::Completed)
            .await?;
        self.sessions
            .append_log(session_id, LogLevel::Info, "Session completed", None, None)
            .await?;

        tracing::info!(session_id = %session_id, "Session completed");
        Ok(())
    }

    /// Best-effort termination of child processes within a bounded
    /// window, then mark the session stopped.
    pub async fn stop_session(&self, session_id: &str) -> DomainResult<()> {
        let mut session = self.load(session_id).await?;

        let mut remaining: Vec<i32> = Vec::new();
        for pid in session.child_pids.clone() {
            match signal_pid(pid, Some(Signal::SIGTERM)) {
                Ok(()) => {
                    remaining.push(pid);
                    self.sessions
                        .append_log(
                            session_id,
                            LogLevel::Info,
                            &format!("Sent SIGTERM to child process {pid}"),
                            None,
                            None,
                        )
                        .await?;
                }
                Err(e) => {
                    // The process may have exited between snapshot and
                    // signal; warned, not fatal.
                    tracing::warn!(pid, error = %e, "Child pid signal failed");
                    self.sessions
                        .append_log(
                            session_id,
                            LogLevel::Warn,
                            &format!("Child process {pid} already dead"),
                            None,
                            None,
                        )
                        .await?;
                }
            }
        }

        let deadline = tokio::time::Instant::now() + STOP_WINDOW;
        while !remaining.is_empty() && tokio::time::Instant::now() < deadline {
            remaining.retain(|pid| signal_pid(*pid, None).is_ok());
            if remaining.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        for pid in &remaining {
            self.sessions
                .append_log(
                    session_id,
                    LogLevel::Warn,
                    &format!("Child process {pid} still alive after stop window"),
                    None,
                    None,
                )
                .await?;
        }

        session.stop();
        session.child_pids.clear();
        self.sessions.update(&session).await?;
        self.swarms
            .update_status(session.swarm_id, SwarmStatus::Stopped)
            .await?;
        self.sessions
            .append_log(session_id, LogLevel::Info, "Session stopped", None, None)
            .await?;

        tracing::info!(session_id = %session_id, "Session stopped");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Child pid tracking
    // ------------------------------------------------------------------

    /// Idempotent over the pid.
    pub async fn add_child_pid(&self, session_id: &str, pid: i32) -> DomainResult<()> {
        let mut session = self.load(session_id).await?;
        session.add_child_pid(pid);
        self.sessions.update(&session).await
    }

    /// Removing an unknown pid succeeds.
    pub async fn remove_child_pid(&self, session_id: &str, pid: i32) -> DomainResult<()> {
        let mut session = self.load(session_id).await?;
        session.remove_child_pid(pid);
        self.sessions.update(&session).await
    }

    // ------------------------------------------------------------------
    // Orphan cleanup, archive, export/import
    // ------------------------------------------------------------------

    /// Stop every active/paused session whose parent process is gone.
    /// Returns the number of sessions reclaimed.
    pub async fn cleanup_orphaned_processes(&self) -> DomainResult<usize> {
        let sessions = self
            .sessions
            .list_by_status(&[SessionStatus::Active, SessionStatus::Paused])
            .await?;

        let mut reclaimed = 0;
        for session in sessions {
            if signal_pid(session.parent_pid, None).is_ok() {
                continue;
            }

            tracing::warn!(
                session_id = %session.id,
                parent_pid = session.parent_pid,
                "Parent process dead; stopping orphaned session"
            );
            self.stop_session(&session.id).await?;
            self.sessions
                .append_log(
                    &session.id,
                    LogLevel::Warn,
                    "Orphaned session cleaned up",
                    None,
                    None,
                )
                .await?;
            reclaimed += 1;
        }

        Ok(reclaimed)
    }

    /// Archive completed sessions older than the cutoff: write the full
    /// export to the archive directory, then delete logs, checkpoints
    /// and the row. Not reversible; archived sessions cannot be resumed.
    pub async fn archive_sessions(&self, days_old: i64) -> DomainResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days_old);
        let completed = self
            .sessions
            .list_by_status(&[SessionStatus::Completed])
            .await?;

        tokio::fs::create_dir_all(&self.archive_dir).await?;

        let mut archived = 0;
        for session in completed {
            if session.completed_at.map_or(session.updated_at, |t| t) > cutoff {
                continue;
            }

            let export = self.build_export(&session.id).await?;
            let path = self.archive_dir.join(format!("{}-archive.json", session.id));
            tokio::fs::write(&path, serde_json::to_vec_pretty(&export)?).await?;

            self.sessions.delete_logs(&session.id).await?;
            self.sessions.delete_checkpoints(&session.id).await?;
            self.sessions.delete(&session.id).await?;

            tracing::info!(session_id = %session.id, path = %path.display(), "Session archived");
            archived += 1;
        }

        Ok(archived)
    }

    async fn build_export(&self, session_id: &str) -> DomainResult<SessionExport> {
        let full = self.get_session(session_id).await?;
        Ok(SessionExport {
            session: full.session,
            swarm: full.swarm,
            agents: full.agents,
            tasks: full.tasks,
            checkpoints: full.checkpoints,
            recent_logs: full.recent_logs,
            statistics: full.statistics,
        })
    }

    /// Serialize the full session graph to JSON. Defaults to
    /// `<sessions_dir>/<sessionId>-export.json`.
    pub async fn export_session(
        &self,
        session_id: &str,
        path: Option<PathBuf>,
    ) -> DomainResult<PathBuf> {
        let export = self.build_export(session_id).await?;
        let path = match path {
            Some(p) => p,
            None => {
                tokio::fs::create_dir_all(&self.sessions_dir).await?;
                self.sessions_dir.join(format!("{session_id}-export.json"))
            }
        };
        tokio::fs::write(&path, serde_json::to_vec_pretty(&export)?).await?;
        Ok(path)
    }

    /// Rebuild a session graph from an export file. A new session id is
    /// minted; swarm, agents and tasks are recreated when absent.
    pub async fn import_session(&self, path: &Path) -> DomainResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let export: SessionExport = serde_json::from_slice(&bytes)
            .map_err(|e| DomainError::CorruptedCheckpoint {
                session_id: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if self.swarms.get(export.swarm.id).await?.is_none() {
            self.swarms.create(&export.swarm).await?;
        }
        for agent in &export.agents {
            if self.agents.get(agent.id).await?.is_none() {
                self.agents.create(agent).await?;
            }
        }
        for task in &export.tasks {
            if self.tasks.get(task.id).await?.is_none() {
                self.tasks.create(task).await?;
            }
        }

        let mut session = export.session.clone();
        session.id = format!("session-{}", Uuid::new_v4());
        session.updated_at = Utc::now();
        self.sessions.create(&session).await?;

        for checkpoint in export.checkpoints.iter().rev() {
            let imported = Checkpoint::new(&session.id, &checkpoint.name, checkpoint.data.clone());
            self.sessions.create_checkpoint(&imported).await?;
        }
        for log in export.recent_logs.iter().rev() {
            self.sessions
                .append_log(
                    &session.id,
                    log.log_level,
                    &log.message,
                    log.agent_id,
                    log.data.clone(),
                )
                .await?;
        }

        self.sessions
            .append_log(
                &session.id,
                LogLevel::Info,
                &format!("Session imported from {}", path.display()),
                None,
                None,
            )
            .await?;

        tracing::info!(session_id = %session.id, "Session imported");
        Ok(session.id)
    }

    // ------------------------------------------------------------------
    // Progress & events
    // ------------------------------------------------------------------

    pub async fn update_session_progress(
        &self,
        session_id: &str,
        completion_percentage: u8,
    ) -> DomainResult<()> {
        let mut session = self.load(session_id).await?;
        session.completion_percentage = completion_percentage.min(100);
        session.updated_at = Utc::now();
        self.sessions.update(&session).await
    }

    pub async fn log_event(
        &self,
        session_id: &str,
        level: LogLevel,
        message: &str,
        agent_id: Option<Uuid>,
        data: Option<serde_json::Value>,
    ) -> DomainResult<()> {
        self.sessions
            .append_log(session_id, level, message, agent_id, data)
            .await
    }
}

fn compute_statistics(agents: &[Agent], tasks: &[Task]) -> SessionStatistics {
    let completed = tasks.iter().filter(|t| t.status == TaskStatus::Completed).count();
    SessionStatistics {
        total_agents: agents.len(),
        active_agents: agents
            .iter()
            .filter(|a| matches!(a.status, AgentStatus::Active | AgentStatus::Busy))
            .count(),
        total_tasks: tasks.len(),
        completed_tasks: completed,
        pending_tasks: tasks.iter().filter(|t| t.status == TaskStatus::Pending).count(),
        in_progress_tasks: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count(),
        completion_percentage: SessionStatistics::percentage(completed, tasks.len()),
    }
}

/// Zero-signal probe (`sig = None`) checks liveness; `SIGTERM` requests
/// termination.
fn signal_pid(pid: i32, sig: Option<Signal>) -> Result<(), DomainError> {
    kill(Pid::from_raw(pid), sig).map_err(|e| DomainError::PidSignalFailed {
        pid,
        reason: e.to_string(),
    })
}
