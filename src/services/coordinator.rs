//! Swarm coordinator.
//!
//! Owns objectives, tasks and agents: decomposes objectives, assigns
//! ready tasks to eligible agents, dispatches to the executor, and
//! collects results. Long operations never hold the in-memory state
//! lock across driver I/O.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, AgentRole, AgentStatus, Objective, ObjectiveStatus, ObjectiveStrategy, QueenType,
    Swarm, SwarmStatus, SwarmTopology, Task, TaskConstraints, TaskStatus,
};
use crate::domain::ports::{
    AgentDriver, AgentRepository, ObjectiveRepository, SwarmRepository, TaskRepository,
};
use crate::services::decomposition;
use crate::services::events::{EventBus, SwarmEvent};
use crate::services::executor::TaskExecutor;

/// Settings for one coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub name: String,
    pub topology: SwarmTopology,
    pub queen_type: QueenType,
    pub max_workers: u32,
    pub max_concurrent_agents: usize,
    /// Bound on the coordinator work queue.
    pub max_tasks: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "hive".to_string(),
            topology: SwarmTopology::default(),
            queen_type: QueenType::default(),
            max_workers: 8,
            max_concurrent_agents: 8,
            max_tasks: 1024,
        }
    }
}

/// Aggregate status report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SwarmStatusReport {
    pub swarm_id: Uuid,
    pub name: String,
    pub topology: String,
    pub status: String,
    pub agents: usize,
    pub idle_agents: usize,
    pub tasks_by_status: HashMap<String, u64>,
}

/// Aggregate metrics report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CoordinatorMetrics {
    pub objectives_total: usize,
    pub objectives_completed: usize,
    pub tasks_by_status: HashMap<String, u64>,
    pub execution: crate::services::executor::ExecutionMetrics,
}

/// Per-agent dispatch counters, used for the lowest-load tie-break.
#[derive(Default)]
struct RoutingState {
    load: HashMap<Uuid, usize>,
}

pub struct SwarmCoordinator {
    swarms: Arc<dyn SwarmRepository>,
    agents: Arc<dyn AgentRepository>,
    objectives: Arc<dyn ObjectiveRepository>,
    tasks: Arc<dyn TaskRepository>,
    executor: Arc<TaskExecutor>,
    events: Arc<EventBus>,
    driver: Arc<dyn AgentDriver>,
    config: CoordinatorConfig,
    swarm_id: Mutex<Option<Uuid>>,
    routing: Mutex<RoutingState>,
    agent_semaphore: Arc<Semaphore>,
}

impl SwarmCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        swarms: Arc<dyn SwarmRepository>,
        agents: Arc<dyn AgentRepository>,
        objectives: Arc<dyn ObjectiveRepository>,
        tasks: Arc<dyn TaskRepository>,
        executor: Arc<TaskExecutor>,
        events: Arc<EventBus>,
        driver: Arc<dyn AgentDriver>,
        config: CoordinatorConfig,
    ) -> Self {
        let max_agents = config.max_concurrent_agents;
        Self {
            swarms,
            agents,
            objectives,
            tasks,
            executor,
            events,
            driver,
            config,
            swarm_id: Mutex::new(None),
            routing: Mutex::new(RoutingState::default()),
            agent_semaphore: Arc::new(Semaphore::new(max_agents)),
        }
    }

    /// Create the swarm row and establish the bounded work queue.
    pub async fn init(&self) -> DomainResult<Uuid> {
        let swarm = Swarm::new(&self.config.name)
            .with_topology(self.config.topology)
            .with_queen_type(self.config.queen_type)
            .with_max_workers(self.config.max_workers);
        swarm
            .validate()
            .map_err(DomainError::InvalidArgument)?;

        self.swarms.create(&swarm).await?;

        {
            let mut id = self.swarm_id.lock().await;
            *id = Some(swarm.id);
        }

        self.events.publish(SwarmEvent::SwarmInitialized {
            swarm_id: swarm.id,
            name: swarm.name.clone(),
        });
        tracing::info!(swarm_id = %swarm.id, name = %swarm.name, "Swarm initialized");

        Ok(swarm.id)
    }

    /// Adopt an existing swarm (resume path).
    pub async fn attach(&self, swarm_id: Uuid) -> DomainResult<()> {
        self.swarms
            .get(swarm_id)
            .await?
            .ok_or(DomainError::SwarmNotFound(swarm_id))?;
        let mut id = self.swarm_id.lock().await;
        *id = Some(swarm_id);
        Ok(())
    }

    pub async fn swarm_id(&self) -> DomainResult<Uuid> {
        (*self.swarm_id.lock().await)
            .ok_or_else(|| DomainError::InvalidArgument("coordinator not initialized".to_string()))
    }

    /// Register an agent and publish it into the routing table. Under a
    /// hierarchical topology the first coordinator-typed agent becomes
    /// the queen.
    pub async fn register_agent(
        &self,
        name: &str,
        agent_type: &str,
        capabilities: Vec<String>,
    ) -> DomainResult<Uuid> {
        let swarm_id = self.swarm_id().await?;

        let role = if self.config.topology == SwarmTopology::Hierarchical
            && agent_type == "coordinator"
        {
            let has_queen = self
                .agents
                .list_by_swarm(swarm_id)
                .await?
                .iter()
                .any(|a| a.role == AgentRole::Queen);
            if has_queen { AgentRole::Worker } else { AgentRole::Queen }
        } else {
            AgentRole::Worker
        };

        let agent = Agent::new(swarm_id, name, agent_type)
            .with_role(role)
            .with_capabilities(capabilities);
        self.agents.create(&agent).await?;

        self.events.publish(SwarmEvent::AgentSpawned {
            agent_id: agent.id,
            name: agent.name.clone(),
            agent_type: agent.agent_type.clone(),
        });
        tracing::info!(agent_id = %agent.id, name = %name, agent_type = %agent_type, "Agent registered");

        Ok(agent.id)
    }

    /// Decompose a description into dependency-ordered tasks using the
    /// strategy template and persist objective plus tasks.
    pub async fn create_objective(
        &self,
        description: &str,
        strategy: ObjectiveStrategy,
    ) -> DomainResult<Uuid> {
        let swarm_id = self.swarm_id().await?;

        let objective = Objective::new(swarm_id, description).with_strategy(strategy);
        self.objectives.create(&objective).await?;

        let tasks = decomposition::decompose(&objective);
        self.ensure_queue_capacity(swarm_id, tasks.len()).await?;
        for task in &tasks {
            self.tasks.create(task).await?;
        }

        self.events.publish(SwarmEvent::ObjectiveCreated {
            objective_id: objective.id,
            task_count: tasks.len(),
        });
        tracing::info!(
            objective_id = %objective.id,
            strategy = objective.strategy.as_str(),
            task_count = tasks.len(),
            "Objective decomposed"
        );

        Ok(objective.id)
    }

    /// Direct task creation bypassing decomposition. Dependency cycles
    /// are rejected at creation time.
    pub async fn create_task(
        &self,
        task_type: &str,
        name: &str,
        description: &str,
        instructions: &str,
        dependencies: Vec<Uuid>,
        priority: i32,
        constraints: Option<TaskConstraints>,
    ) -> DomainResult<Uuid> {
        let swarm_id = self.swarm_id().await?;
        self.ensure_queue_capacity(swarm_id, 1).await?;

        let mut task = Task::new(swarm_id, task_type, name)
            .with_description(description)
            .with_instructions(instructions)
            .with_priority(priority);
        if let Some(constraints) = constraints {
            task = task.with_constraints(constraints);
        }
        for dep in dependencies {
            if self.tasks.get(dep).await?.is_none() {
                return Err(DomainError::TaskNotFound(dep));
            }
            task = task.with_dependency(dep);
        }
        task.validate().map_err(DomainError::InvalidArgument)?;

        self.ensure_acyclic(&task).await?;
        self.tasks.create(&task).await?;

        tracing::debug!(task_id = %task.id, name = %name, "Task created");
        Ok(task.id)
    }

    /// Add a dependency edge to an existing task, rejecting edges that
    /// would close a cycle.
    pub async fn add_task_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;
        if self.tasks.get(depends_on).await?.is_none() {
            return Err(DomainError::TaskNotFound(depends_on));
        }
        if task_id == depends_on {
            return Err(DomainError::CyclicDependency(task_id));
        }

        let existing = self.tasks.list_by_swarm(task.swarm_id).await?;
        if edge_closes_cycle(&existing, task_id, depends_on) {
            return Err(DomainError::CyclicDependency(task_id));
        }

        self.tasks.add_dependency(task_id, depends_on).await
    }

    /// Reject dependency graphs that are not a DAG.
    async fn ensure_acyclic(&self, new_task: &Task) -> DomainResult<()> {
        let swarm_id = new_task.swarm_id;
        let existing = self.tasks.list_by_swarm(swarm_id).await?;

        let mut edges: HashMap<Uuid, Vec<Uuid>> = existing
            .iter()
            .map(|t| (t.id, t.depends_on.clone()))
            .collect();
        edges.insert(new_task.id, new_task.depends_on.clone());

        // DFS from the new task: reaching it again means a cycle.
        let mut stack: Vec<Uuid> = new_task.depends_on.clone();
        let mut visited: HashSet<Uuid> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == new_task.id {
                return Err(DomainError::CyclicDependency(new_task.id));
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(deps) = edges.get(&current) {
                stack.extend(deps.iter().copied());
            }
        }
        Ok(())
    }

    async fn ensure_queue_capacity(&self, swarm_id: Uuid, adding: usize) -> DomainResult<()> {
        let counts = self.tasks.count_by_status(swarm_id).await?;
        let open: u64 = counts
            .iter()
            .filter(|(status, _)| !status.is_terminal())
            .map(|(_, n)| n)
            .sum();
        if open as usize + adding > self.config.max_tasks {
            return Err(DomainError::InvalidArgument(format!(
                "work queue full ({} open tasks, limit {})",
                open, self.config.max_tasks
            )));
        }
        Ok(())
    }

    /// Whether every dependency of the task is completed.
    async fn dependencies_satisfied(&self, task: &Task) -> DomainResult<bool> {
        for dep_id in &task.depends_on {
            let dep = self
                .tasks
                .get(*dep_id)
                .await?
                .ok_or(DomainError::TaskNotFound(*dep_id))?;
            if dep.status != TaskStatus::Completed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Agents eligible for dispatch under the configured topology.
    fn eligible(&self, agents: Vec<Agent>) -> Vec<Agent> {
        match self.config.topology {
            // Queens coordinate their sub-tree; workers execute.
            SwarmTopology::Hierarchical => {
                let workers: Vec<Agent> = agents
                    .iter()
                    .filter(|a| a.role == AgentRole::Worker)
                    .cloned()
                    .collect();
                if workers.is_empty() { agents } else { workers }
            }
            _ => agents,
        }
    }

    /// Choose an agent for a task and atomically claim the pair.
    ///
    /// Selection: idle agents filtered by capability match against the
    /// task type (a `coding` task prefers `code_generation`), tie-broken
    /// by lowest dispatch load then insertion order. Returns `None` when
    /// dependencies are unsatisfied or no agent is eligible.
    pub async fn assign_task(&self, task_id: Uuid) -> DomainResult<Option<Uuid>> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        if task.status != TaskStatus::Pending {
            return Ok(None);
        }
        if !self.dependencies_satisfied(&task).await? {
            return Ok(None);
        }

        let idle = self
            .agents
            .list_by_status(task.swarm_id, AgentStatus::Idle)
            .await?;
        let idle = self.eligible(idle);
        if idle.is_empty() {
            return Ok(None);
        }

        let required = capability_for_task_type(&task.task_type);
        let matched: Vec<&Agent> = match required {
            Some(tag) => {
                let with_cap: Vec<&Agent> =
                    idle.iter().filter(|a| a.has_capability(tag)).collect();
                // Preference, not a hard requirement: fall back to any
                // idle agent when nothing advertises the tag.
                if with_cap.is_empty() { idle.iter().collect() } else { with_cap }
            }
            None => idle.iter().collect(),
        };

        let chosen = {
            let routing = self.routing.lock().await;
            matched
                .into_iter()
                .min_by_key(|a| routing.load.get(&a.id).copied().unwrap_or(0))
                .map(|a| a.id)
        };
        let Some(agent_id) = chosen else {
            return Ok(None);
        };

        // Atomic claim: another worker may have taken the task already
        // under mesh/distributed stealing.
        let Some(_claimed) = self.tasks.claim_task(task_id, agent_id).await? else {
            return Ok(None);
        };
        self.agents
            .update_status(agent_id, AgentStatus::Active, Some(task_id))
            .await?;

        {
            let mut routing = self.routing.lock().await;
            *routing.load.entry(agent_id).or_insert(0) += 1;
        }

        self.events.publish(SwarmEvent::TaskAssigned { task_id, agent_id });
        tracing::debug!(task_id = %task_id, agent_id = %agent_id, "Task assigned");

        Ok(Some(agent_id))
    }

    /// Main scheduling loop: assign ready tasks, dispatch to the
    /// executor, collect results; complete when every task of the
    /// objective is terminal.
    pub async fn execute_objective(&self, objective_id: Uuid) -> DomainResult<ObjectiveStatus> {
        let mut objective = self
            .objectives
            .get(objective_id)
            .await?
            .ok_or(DomainError::ObjectiveNotFound(objective_id))?;

        objective.mark_executing();
        self.objectives.update(&objective).await?;
        tracing::info!(objective_id = %objective_id, "Objective execution started");

        let mut join_set: JoinSet<DomainResult<()>> = JoinSet::new();
        let mut dispatched: HashSet<Uuid> = HashSet::new();

        loop {
            // Reap finished executions without blocking.
            while let Some(result) = join_set.try_join_next() {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "Task execution errored"),
                    Err(e) => tracing::error!(error = %e, "Task execution panicked"),
                }
            }

            let tasks = self.tasks.list_by_objective(objective_id).await?;
            if tasks.iter().all(Task::is_terminal) && join_set.is_empty() {
                break;
            }

            // Ready tasks ordered by priority (secondary to readiness).
            let mut ready: Vec<&Task> = Vec::new();
            for task in &tasks {
                if task.status == TaskStatus::Pending
                    && !dispatched.contains(&task.id)
                    && self.dependencies_satisfied(task).await?
                {
                    ready.push(task);
                }
            }
            ready.sort_by_key(|t| std::cmp::Reverse(t.priority));

            let mut dispatched_this_round = false;
            for task in ready {
                let Some(agent_id) = self.assign_task(task.id).await? else {
                    continue;
                };
                dispatched.insert(task.id);
                dispatched_this_round = true;

                let permit = self
                    .agent_semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| DomainError::InvalidArgument(e.to_string()))?;
                let executor = self.executor.clone();
                let driver = self.driver.clone();
                let task_id = task.id;
                join_set.spawn(async move {
                    let _permit = permit;
                    executor.execute(task_id, agent_id, driver).await.map(|_| ())
                });
            }

            if !dispatched_this_round {
                if join_set.is_empty() {
                    // Nothing running and nothing assignable: wait for
                    // an agent status change to re-evaluate.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                } else if let Some(result) = join_set.join_next().await {
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::warn!(error = %e, "Task execution errored"),
                        Err(e) => tracing::error!(error = %e, "Task execution panicked"),
                    }
                }
            }
        }

        // Completed iff every non-cancelled task completed; failed if
        // any task failed.
        let tasks = self.tasks.list_by_objective(objective_id).await?;
        let any_failed = tasks.iter().any(|t| t.status == TaskStatus::Failed);
        if any_failed {
            objective.mark_failed();
        } else {
            objective.mark_completed();
        }
        self.objectives.update(&objective).await?;

        self.events.publish(SwarmEvent::ObjectiveCompleted {
            objective_id,
            failed: any_failed,
        });
        tracing::info!(
            objective_id = %objective_id,
            status = objective.status.as_str(),
            "Objective finished"
        );

        Ok(objective.status)
    }

    /// Mark an agent failed and put its current task back in the queue
    /// when retry budget remains.
    pub async fn handle_failure(&self, agent_id: Uuid, error: &str) -> DomainResult<()> {
        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or(DomainError::AgentNotFound(agent_id))?;

        self.agents
            .update_status(agent_id, AgentStatus::Failed, None)
            .await?;

        if let Some(task_id) = agent.current_task_id {
            if let Some(mut task) = self.tasks.get(task_id).await? {
                if !task.is_terminal() {
                    if task.can_retry() {
                        task.force_status(TaskStatus::Pending, "agent failure reassignment");
                        task.assigned_agent_id = None;
                    } else {
                        task.error = Some(error.to_string());
                        task.force_status(TaskStatus::Failed, "agent failure, no retry budget");
                    }
                    self.tasks.update(&task).await?;
                }
            }
        }

        self.events.publish(SwarmEvent::AgentFailed {
            agent_id,
            error: error.to_string(),
        });
        tracing::warn!(agent_id = %agent_id, error = %error, "Agent failure handled");

        Ok(())
    }

    pub async fn swarm_status(&self) -> DomainResult<SwarmStatusReport> {
        let swarm_id = self.swarm_id().await?;
        let swarm = self
            .swarms
            .get(swarm_id)
            .await?
            .ok_or(DomainError::SwarmNotFound(swarm_id))?;

        let agents = self.agents.list_by_swarm(swarm_id).await?;
        let idle = agents.iter().filter(|a| a.status == AgentStatus::Idle).count();
        let counts = self.tasks.count_by_status(swarm_id).await?;

        Ok(SwarmStatusReport {
            swarm_id,
            name: swarm.name,
            topology: swarm.topology.as_str().to_string(),
            status: swarm.status.as_str().to_string(),
            agents: agents.len(),
            idle_agents: idle,
            tasks_by_status: counts
                .into_iter()
                .map(|(k, v)| (k.as_str().to_string(), v))
                .collect(),
        })
    }

    pub async fn metrics(&self) -> DomainResult<CoordinatorMetrics> {
        let swarm_id = self.swarm_id().await?;
        let objectives = self.objectives.list_by_swarm(swarm_id).await?;
        let counts = self.tasks.count_by_status(swarm_id).await?;

        Ok(CoordinatorMetrics {
            objectives_total: objectives.len(),
            objectives_completed: objectives
                .iter()
                .filter(|o| o.status == ObjectiveStatus::Completed)
                .count(),
            tasks_by_status: counts
                .into_iter()
                .map(|(k, v)| (k.as_str().to_string(), v))
                .collect(),
            execution: self.executor.execution_metrics(),
        })
    }

    /// Pause the swarm (cancellation leaves sessions active; this is the
    /// cascade target used by the session manager and signal handler).
    pub async fn pause(&self) -> DomainResult<()> {
        let swarm_id = self.swarm_id().await?;
        self.swarms.update_status(swarm_id, SwarmStatus::Paused).await
    }
}

/// Whether adding `task_id -> depends_on` would close a cycle: true iff
/// `task_id` is already reachable from `depends_on` over dependency
/// edges.
pub fn edge_closes_cycle(existing: &[Task], task_id: Uuid, depends_on: Uuid) -> bool {
    if task_id == depends_on {
        return true;
    }

    let edges: HashMap<Uuid, &Vec<Uuid>> =
        existing.iter().map(|t| (t.id, &t.depends_on)).collect();

    let mut stack = vec![depends_on];
    let mut visited: HashSet<Uuid> = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == task_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(deps) = edges.get(&current) {
            stack.extend(deps.iter().copied());
        }
    }
    false
}

/// Structural capability match: task types map to the capability tag an
/// agent advertises for them. Generic tasks accept any agent.
fn capability_for_task_type(task_type: &str) -> Option<&'static str> {
    match task_type {
        "coding" => Some("code_generation"),
        "analysis" => Some("analysis"),
        "testing" => Some("testing"),
        "research" => Some("research"),
        _ => None,
    }
}
