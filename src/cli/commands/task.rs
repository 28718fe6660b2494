//! Task commands.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use serde::Serialize;
use std::collections::HashMap;

use crate::cli::commands::{domain, AppContext, CommandResult};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::TaskFilter;
use crate::services::coordinator::edge_closes_cycle;

#[derive(Debug, Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub name: String,
    pub task_type: String,
    pub status: String,
    pub priority: i32,
    pub progress: u8,
    pub attempt_count: u32,
    pub dependencies: Vec<String>,
    pub error: Option<String>,
}

impl From<&Task> for TaskOutput {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.name.clone(),
            task_type: task.task_type.clone(),
            status: task.status.as_str().to_string(),
            priority: task.priority,
            progress: task.progress,
            attempt_count: task.attempt_count,
            dependencies: task.depends_on.iter().map(ToString::to_string).collect(),
            error: task.error.clone(),
        }
    }
}

impl CommandOutput for TaskOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Task {}", self.id),
            format!("  name:     {}", self.name),
            format!("  type:     {}", self.task_type),
            format!("  status:   {}", self.status),
            format!("  priority: {}", self.priority),
            format!("  progress: {}%", self.progress),
            format!("  attempts: {}", self.attempt_count),
        ];
        if !self.dependencies.is_empty() {
            lines.push(format!("  depends:  {}", self.dependencies.join(", ")));
        }
        if let Some(error) = &self.error {
            lines.push(format!("  error:    {error}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskOutput>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["ID", "NAME", "TYPE", "STATUS", "PRI", "PROG"]);
        for task in &self.tasks {
            table.add_row(vec![
                task.id[..8].to_string(),
                truncate(&task.name, 32),
                task.task_type.clone(),
                task.status.clone(),
                task.priority.to_string(),
                format!("{}%", task.progress),
            ]);
        }
        format!("{table}\n{} task(s)", self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct TaskStatsOutput {
    pub by_status: HashMap<String, u64>,
    pub total: u64,
}

impl CommandOutput for TaskStatsOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} task(s) total", self.total)];
        let mut pairs: Vec<(&String, &u64)> = self.by_status.iter().collect();
        pairs.sort();
        for (status, count) in pairs {
            lines.push(format!("  {status}: {count}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ActionOutput {
    pub task_id: String,
    pub action: String,
}

impl CommandOutput for ActionOutput {
    fn to_human(&self) -> String {
        format!("Task {} {}", self.task_id, self.action)
    }
}

pub async fn handle_list(
    ctx: &AppContext,
    status: Option<String>,
    limit: usize,
    json: bool,
) -> CommandResult<()> {
    let swarm_id = ctx.current_swarm_id().await?;
    let status = match status {
        Some(s) => Some(
            TaskStatus::from_str(&s)
                .ok_or_else(|| DomainError::InvalidArgument(format!("unknown status: {s}")))?,
        ),
        None => None,
    };

    let tasks = domain(
        ctx.tasks
            .list(TaskFilter {
                swarm_id: Some(swarm_id),
                status,
                limit: Some(limit),
                ..TaskFilter::default()
            })
            .await,
    )?;

    let outputs: Vec<TaskOutput> = tasks.iter().map(Into::into).collect();
    output(
        &TaskListOutput {
            total: outputs.len(),
            tasks: outputs,
        },
        json,
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_create(
    ctx: &AppContext,
    task_type: String,
    name: String,
    description: String,
    instructions: String,
    dependencies: Vec<String>,
    priority: i32,
    json: bool,
) -> CommandResult<()> {
    let swarm_id = ctx.current_swarm_id().await?;

    let mut task = Task::new(swarm_id, &task_type, &name)
        .with_description(&description)
        .with_instructions(&instructions)
        .with_priority(priority);
    for dep in dependencies {
        let dep_id = ctx.resolve_task_id(&dep).await?;
        task = task.with_dependency(dep_id);
    }
    task.validate().map_err(DomainError::InvalidArgument)?;

    domain(ctx.tasks.create(&task).await)?;
    output(&TaskOutput::from(&task), json);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_update(
    ctx: &AppContext,
    task_id: String,
    status: Option<String>,
    priority: Option<i32>,
    add_dependency: Vec<String>,
    remove_dependency: Vec<String>,
    json: bool,
) -> CommandResult<()> {
    let task_id = ctx.resolve_task_id(&task_id).await?;
    let mut task = domain(ctx.tasks.get(task_id).await)?
        .ok_or(DomainError::TaskNotFound(task_id))?;

    for dep in add_dependency {
        let dep_id = ctx.resolve_task_id(&dep).await?;
        let existing = domain(ctx.tasks.list_by_swarm(task.swarm_id).await)?;
        if edge_closes_cycle(&existing, task_id, dep_id) {
            return Err(DomainError::CyclicDependency(task_id).into());
        }
        domain(ctx.tasks.add_dependency(task_id, dep_id).await)?;
    }
    for dep in remove_dependency {
        let dep_id = ctx.resolve_task_id(&dep).await?;
        domain(ctx.tasks.remove_dependency(task_id, dep_id).await)?;
    }

    if let Some(status) = status {
        let new_status = TaskStatus::from_str(&status)
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown status: {status}")))?;
        task.transition_to(new_status)
            .map_err(|_| DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            })?;
    }
    if let Some(priority) = priority {
        task.priority = priority;
    }

    domain(ctx.tasks.update(&task).await)?;
    output(
        &ActionOutput {
            task_id: task_id.to_string(),
            action: "updated".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_show(ctx: &AppContext, task_id: String, json: bool) -> CommandResult<()> {
    let task_id = ctx.resolve_task_id(&task_id).await?;
    let task = domain(ctx.tasks.get(task_id).await)?
        .ok_or(DomainError::TaskNotFound(task_id))?;
    output(&TaskOutput::from(&task), json);
    Ok(())
}

pub async fn handle_delete(ctx: &AppContext, task_id: String, json: bool) -> CommandResult<()> {
    let task_id = ctx.resolve_task_id(&task_id).await?;
    domain(ctx.tasks.delete(task_id).await)?;
    output(
        &ActionOutput {
            task_id: task_id.to_string(),
            action: "deleted".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_stats(ctx: &AppContext, json: bool) -> CommandResult<()> {
    let swarm_id = ctx.current_swarm_id().await?;
    let counts = domain(ctx.tasks.count_by_status(swarm_id).await)?;

    let by_status: HashMap<String, u64> = counts
        .into_iter()
        .map(|(k, v)| (k.as_str().to_string(), v))
        .collect();
    let total = by_status.values().sum();

    output(&TaskStatsOutput { by_status, total }, json);
    Ok(())
}

pub async fn handle_search(ctx: &AppContext, query: String, json: bool) -> CommandResult<()> {
    let swarm_id = ctx.current_swarm_id().await?;
    let tasks = domain(ctx.tasks.search(Some(swarm_id), &query).await)?;

    let outputs: Vec<TaskOutput> = tasks.iter().map(Into::into).collect();
    output(
        &TaskListOutput {
            total: outputs.len(),
            tasks: outputs,
        },
        json,
    );
    Ok(())
}
