//! `spawn` command: init a swarm, decompose the objective, execute it.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::drivers::{SubprocessConfig, SubprocessDriver};
use crate::cli::commands::{domain, AppContext, CommandResult};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{ObjectiveStrategy, QueenType};
use crate::services::{AutoSaveMiddleware, CoordinatorConfig, SwarmCoordinator};

/// Default worker roster registered by spawn. Capabilities line up with
/// the task types the decomposition templates emit.
const DEFAULT_AGENTS: &[(&str, &str, &[&str])] = &[
    ("queen", "coordinator", &["coordination"]),
    ("researcher-1", "researcher", &["research", "analysis"]),
    ("coder-1", "coder", &["code_generation"]),
    ("tester-1", "tester", &["testing"]),
    ("analyst-1", "analyst", &["analysis"]),
];

#[derive(Debug, Serialize)]
pub struct SpawnOutput {
    pub swarm_id: String,
    pub session_id: String,
    pub objective_id: String,
    pub status: String,
}

impl CommandOutput for SpawnOutput {
    fn to_human(&self) -> String {
        format!(
            "Objective {}\n  swarm:   {}\n  session: {}\n  status:  {}",
            self.objective_id, self.swarm_id, self.session_id, self.status
        )
    }
}

#[allow(clippy::too_many_lines)]
pub async fn handle_spawn(
    ctx: &AppContext,
    objective: String,
    name: Option<String>,
    queen_type: Option<String>,
    max_workers: Option<u32>,
    json: bool,
) -> CommandResult<()> {
    let queen_type = match queen_type {
        Some(q) => QueenType::from_str(&q)
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown queen type: {q}")))?,
        None => QueenType::default(),
    };

    let coordinator_config = CoordinatorConfig {
        name: name.unwrap_or_else(|| "hive".to_string()),
        queen_type,
        max_workers: max_workers.unwrap_or(8),
        max_concurrent_agents: ctx.config.orchestrator.max_concurrent_agents,
        max_tasks: ctx.config.orchestrator.max_tasks,
        ..CoordinatorConfig::default()
    };

    let driver = Arc::new(SubprocessDriver::new(SubprocessConfig::default()));
    let coordinator = SwarmCoordinator::new(
        ctx.swarms.clone(),
        ctx.agents.clone(),
        ctx.objectives.clone(),
        ctx.tasks.clone(),
        ctx.executor.clone(),
        ctx.events.clone(),
        driver,
        coordinator_config.clone(),
    );

    let swarm_id = domain(coordinator.init().await)?;
    let session_id = domain(
        ctx.session_manager
            .create_session(
                swarm_id,
                &coordinator_config.name,
                Some(objective.clone()),
                HashMap::new(),
            )
            .await,
    )?;

    let worker_budget = coordinator_config.max_workers as usize;
    for &(agent_name, agent_type, capabilities) in DEFAULT_AGENTS.iter().take(worker_budget.max(1)) {
        domain(
            coordinator
                .register_agent(
                    agent_name,
                    agent_type,
                    capabilities.iter().map(ToString::to_string).collect(),
                )
                .await,
        )?;
    }

    let objective_id = domain(
        coordinator
            .create_objective(&objective, ObjectiveStrategy::Auto)
            .await,
    )?;

    let autosave = AutoSaveMiddleware::new(
        session_id.clone(),
        ctx.session_manager.clone(),
        ctx.events.clone(),
        Duration::from_secs(ctx.config.autosave.interval_secs),
        ctx.config.autosave.enabled,
    );
    autosave.start().await;

    let spinner = if json {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message("Executing objective...");
        Some(bar)
    };

    // SIGINT: force-flush the auto-save buffer, pause the session, then
    // surface the interruption.
    let status = tokio::select! {
        status = coordinator.execute_objective(objective_id) => domain(status)?,
        _ = tokio::signal::ctrl_c() => {
            if let Some(bar) = &spinner {
                bar.finish_and_clear();
            }
            if let Err(e) = autosave.force_save().await {
                tracing::warn!(error = %e, "Force save on interrupt failed");
            }
            domain(ctx.session_manager.pause_session(&session_id).await)?;
            eprintln!("Interrupted; session {session_id} paused. Resume with `hivemind resume {session_id}`.");
            return Ok(());
        }
    };

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    domain(autosave.stop().await)?;
    if status == crate::domain::models::ObjectiveStatus::Completed {
        domain(ctx.session_manager.complete_session(&session_id).await)?;
    }

    output(
        &SpawnOutput {
            swarm_id: swarm_id.to_string(),
            session_id,
            objective_id: objective_id.to_string(),
            status: status.as_str().to_string(),
        },
        json,
    );
    Ok(())
}
