//! Session commands: sessions, resume, status, pause, stop.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use console::style;
use serde::Serialize;

use crate::cli::commands::{domain, AppContext, CommandResult};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::services::session_manager::{FullSession, SessionSummary};

#[derive(Debug, Serialize)]
pub struct SessionListOutput {
    pub sessions: Vec<SessionSummary>,
}

impl CommandOutput for SessionListOutput {
    fn to_human(&self) -> String {
        if self.sessions.is_empty() {
            return "No active sessions.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["SESSION", "SWARM", "STATUS", "AGENTS", "TASKS", "DONE"]);
        for summary in &self.sessions {
            table.add_row(vec![
                truncate(&summary.session.id, 24),
                truncate(&summary.session.swarm_name, 20),
                summary.session.status.as_str().to_string(),
                summary.agent_count.to_string(),
                format!("{}/{}", summary.completed_tasks, summary.task_count),
                format!("{}%", summary.completion_percentage),
            ]);
        }
        table.to_string()
    }
}

pub async fn handle_sessions(ctx: &AppContext, json: bool) -> CommandResult<()> {
    let sessions = domain(ctx.session_manager.get_active_sessions().await)?;
    output(&SessionListOutput { sessions }, json);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SessionDetailOutput {
    #[serde(flatten)]
    pub full: FullSession,
}

impl CommandOutput for SessionDetailOutput {
    fn to_human(&self) -> String {
        let s = &self.full.session;
        let stats = &self.full.statistics;
        let mut lines = vec![
            format!("Session {}", style(&s.id).bold()),
            format!("  swarm:      {} ({})", s.swarm_name, s.swarm_id),
            format!("  status:     {}", s.status.as_str()),
            format!("  objective:  {}", s.objective.as_deref().unwrap_or("-")),
            format!("  progress:   {}%", stats.completion_percentage),
            format!(
                "  tasks:      {} total, {} completed, {} in progress, {} pending",
                stats.total_tasks,
                stats.completed_tasks,
                stats.in_progress_tasks,
                stats.pending_tasks
            ),
            format!(
                "  agents:     {} total, {} active",
                stats.total_agents, stats.active_agents
            ),
            format!("  created:    {}", s.created_at.to_rfc3339()),
            format!("  updated:    {}", s.updated_at.to_rfc3339()),
        ];

        if !self.full.checkpoints.is_empty() {
            lines.push(format!(
                "  checkpoint: {} ({})",
                self.full.checkpoints[0].name,
                self.full.checkpoints[0].created_at.to_rfc3339()
            ));
        }

        if !self.full.recent_logs.is_empty() {
            lines.push("\nRecent events:".to_string());
            for log in self.full.recent_logs.iter().take(10) {
                lines.push(format!(
                    "  [{}] {} {}",
                    log.log_level.as_str(),
                    log.timestamp.format("%H:%M:%S"),
                    truncate(&log.message, 70)
                ));
            }
        }

        lines.join("\n")
    }
}

pub async fn handle_status(ctx: &AppContext, session_id: String, json: bool) -> CommandResult<()> {
    let session_id = ctx.resolve_session_id(&session_id).await?;
    let full = domain(ctx.session_manager.get_session(&session_id).await)?;
    output(&SessionDetailOutput { full }, json);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SessionActionOutput {
    pub session_id: String,
    pub action: String,
    pub status: String,
}

impl CommandOutput for SessionActionOutput {
    fn to_human(&self) -> String {
        format!("Session {} {}", self.session_id, self.action)
    }
}

pub async fn handle_pause(ctx: &AppContext, session_id: String, json: bool) -> CommandResult<()> {
    let session_id = ctx.resolve_session_id(&session_id).await?;
    domain(ctx.session_manager.pause_session(&session_id).await)?;
    output(
        &SessionActionOutput {
            session_id,
            action: "paused".to_string(),
            status: "paused".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_stop(ctx: &AppContext, session_id: String, json: bool) -> CommandResult<()> {
    let session_id = ctx.resolve_session_id(&session_id).await?;
    domain(ctx.session_manager.stop_session(&session_id).await)?;
    output(
        &SessionActionOutput {
            session_id,
            action: "stopped".to_string(),
            status: "stopped".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_resume(
    ctx: &AppContext,
    session_id: String,
    claude: bool,
    json: bool,
) -> CommandResult<()> {
    let session_id = ctx.resolve_session_id(&session_id).await?;
    domain(ctx.session_manager.resume_session(&session_id).await)?;
    let full = domain(ctx.session_manager.get_session(&session_id).await)?;

    if claude {
        // Human-readable context prompt for an interactive agent.
        println!("{}", context_prompt(&full));
        return Ok(());
    }

    output(
        &SessionActionOutput {
            session_id,
            action: format!(
                "resumed ({}% complete, {} tasks remaining)",
                full.statistics.completion_percentage,
                full.statistics.total_tasks - full.statistics.completed_tasks
            ),
            status: "active".to_string(),
        },
        json,
    );
    Ok(())
}

fn context_prompt(full: &FullSession) -> String {
    let s = &full.session;
    let mut lines = vec![
        format!("# Resuming session {}", s.id),
        String::new(),
        format!("Swarm: {} ({} agents)", s.swarm_name, full.agents.len()),
        format!(
            "Objective: {}",
            s.objective.as_deref().unwrap_or("(none recorded)")
        ),
        format!("Progress: {}%", full.statistics.completion_percentage),
        String::new(),
        "## Open tasks".to_string(),
    ];

    let mut open = 0;
    for task in &full.tasks {
        if !task.status.is_terminal() {
            lines.push(format!("- [{}] {}", task.status.as_str(), task.name));
            open += 1;
        }
    }
    if open == 0 {
        lines.push("- (none)".to_string());
    }

    if let Some(checkpoint) = full.checkpoints.first() {
        lines.push(String::new());
        lines.push(format!(
            "Latest checkpoint: {} at {}",
            checkpoint.name,
            checkpoint.created_at.to_rfc3339()
        ));
    }

    lines.join("\n")
}
