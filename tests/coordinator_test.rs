//! Coordinator integration tests: dependency scheduling, assignment,
//! cycle rejection, failure handling.

mod common;

use common::Harness;
use std::sync::Arc;

use hivemind::adapters::drivers::InProcessDriver;
use hivemind::domain::errors::DomainError;
use hivemind::domain::models::{
    Objective, ObjectiveStatus, ObjectiveStrategy, Task, TaskStatus,
};
use hivemind::domain::ports::{AgentRepository, ObjectiveRepository, TaskRepository};
use hivemind::services::{CoordinatorConfig, CoordinatorMetrics, SwarmCoordinator, SwarmEvent};

async fn harness() -> (Harness, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path().join("sessions")).await;
    (harness, dir)
}

fn driver() -> Arc<InProcessDriver> {
    Arc::new(InProcessDriver::succeeding(vec!["done".to_string()]))
}

async fn init_coordinator(h: &Harness) -> SwarmCoordinator {
    let coordinator = h.coordinator(driver(), CoordinatorConfig::default());
    coordinator.init().await.unwrap();
    coordinator
}

/// Dependency scheduling: A -> B -> C complete strictly in order with a
/// single agent.
#[tokio::test]
async fn test_dependency_chain_executes_in_order() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;
    let swarm_id = coordinator.swarm_id().await.unwrap();

    coordinator
        .register_agent(
            "solo",
            "coder",
            vec![
                "code_generation".to_string(),
                "analysis".to_string(),
                "testing".to_string(),
            ],
        )
        .await
        .unwrap();

    let objective = Objective::new(swarm_id, "ordered work");
    h.objectives.create(&objective).await.unwrap();

    let a = Task::new(swarm_id, "coding", "A")
        .with_objective(objective.id)
        .with_instructions("step a");
    let b = Task::new(swarm_id, "coding", "B")
        .with_objective(objective.id)
        .with_instructions("step b")
        .with_dependency(a.id);
    let c = Task::new(swarm_id, "coding", "C")
        .with_objective(objective.id)
        .with_instructions("step c")
        .with_dependency(b.id);
    for task in [&a, &b, &c] {
        h.tasks.create(task).await.unwrap();
    }

    let mut events = h.events.subscribe();

    let status = coordinator.execute_objective(objective.id).await.unwrap();
    assert_eq!(status, ObjectiveStatus::Completed);

    // Completion events arrive in dependency order.
    let mut completion_order = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        if let SwarmEvent::TaskCompleted { task_id, .. } = envelope.event {
            completion_order.push(task_id);
        }
    }
    assert_eq!(completion_order, vec![a.id, b.id, c.id]);

    for task in [a.id, b.id, c.id] {
        let task = h.tasks.get(task).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }
}

/// Dependency gate: a task with an incomplete dependency is never
/// assigned.
#[tokio::test]
async fn test_assignment_respects_dependencies() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;
    let swarm_id = coordinator.swarm_id().await.unwrap();

    coordinator
        .register_agent("w", "coder", vec!["code_generation".to_string()])
        .await
        .unwrap();

    let dep = Task::new(swarm_id, "coding", "dep");
    let blocked = Task::new(swarm_id, "coding", "blocked").with_dependency(dep.id);
    h.tasks.create(&dep).await.unwrap();
    h.tasks.create(&blocked).await.unwrap();

    let assigned = coordinator.assign_task(blocked.id).await.unwrap();
    assert!(assigned.is_none());

    let still_pending = h.tasks.get(blocked.id).await.unwrap().unwrap();
    assert_eq!(still_pending.status, TaskStatus::Pending);
}

/// Capability preference: a coding task goes to the agent advertising
/// code_generation over an equally idle one without it.
#[tokio::test]
async fn test_capability_preference() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;
    let swarm_id = coordinator.swarm_id().await.unwrap();

    let _generalist = coordinator
        .register_agent("generalist", "analyst", vec!["analysis".to_string()])
        .await
        .unwrap();
    let specialist = coordinator
        .register_agent("specialist", "coder", vec!["code_generation".to_string()])
        .await
        .unwrap();

    let task = Task::new(swarm_id, "coding", "implement");
    h.tasks.create(&task).await.unwrap();

    let assigned = coordinator.assign_task(task.id).await.unwrap();
    assert_eq!(assigned, Some(specialist));

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Assigned);
    assert_eq!(task.assigned_agent_id, Some(specialist));
}

/// No eligible agent: the task stays pending.
#[tokio::test]
async fn test_no_agent_leaves_task_pending() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;
    let swarm_id = coordinator.swarm_id().await.unwrap();

    let task = Task::new(swarm_id, "coding", "lonely");
    h.tasks.create(&task).await.unwrap();

    let assigned = coordinator.assign_task(task.id).await.unwrap();
    assert!(assigned.is_none());
}

/// Dependency edges that would close a cycle are rejected.
#[tokio::test]
async fn test_cycle_rejected() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;
    let _ = &h;

    let a = coordinator
        .create_task("coding", "a", "", "x", vec![], 0, None)
        .await
        .unwrap();
    let b = coordinator
        .create_task("coding", "b", "", "x", vec![a], 0, None)
        .await
        .unwrap();
    let c = coordinator
        .create_task("coding", "c", "", "x", vec![b], 0, None)
        .await
        .unwrap();

    // a -> c would close a -> c -> b -> a.
    let err = coordinator.add_task_dependency(a, c).await.unwrap_err();
    assert!(matches!(err, DomainError::CyclicDependency(_)));

    // Self-dependency is a degenerate cycle.
    let err = coordinator.add_task_dependency(a, a).await.unwrap_err();
    assert!(matches!(err, DomainError::CyclicDependency(_)));

    // A forward edge on the DAG is fine.
    coordinator.add_task_dependency(c, a).await.unwrap();
}

/// Unknown dependencies are a user error.
#[tokio::test]
async fn test_unknown_dependency_rejected() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;
    let _ = h;

    let err = coordinator
        .create_task("coding", "t", "", "x", vec![uuid::Uuid::new_v4()], 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::TaskNotFound(_)));
}

/// Objective decomposition persists template tasks wired by dependency.
#[tokio::test]
async fn test_create_objective_decomposes() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;

    let objective_id = coordinator
        .create_objective("Research caching strategies", ObjectiveStrategy::Auto)
        .await
        .unwrap();

    let tasks = h.tasks.list_by_objective(objective_id).await.unwrap();
    // Research template: gather -> synthesize -> analyze.
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().any(|t| t.name == "gather"));
    assert!(tasks.iter().any(|t| t.name == "synthesize"));
}

/// An objective with a failing task finishes failed.
#[tokio::test]
async fn test_objective_fails_when_task_exhausts_retries() {
    let (h, _dir) = harness().await;
    // Driver that always fails.
    let driver: Arc<InProcessDriver> = Arc::new(InProcessDriver::failing_first(u32::MAX, vec![]));
    let coordinator = h.coordinator(driver, CoordinatorConfig::default());
    coordinator.init().await.unwrap();
    let swarm_id = coordinator.swarm_id().await.unwrap();

    coordinator
        .register_agent("w", "coder", vec!["code_generation".to_string()])
        .await
        .unwrap();

    let objective = Objective::new(swarm_id, "doomed");
    h.objectives.create(&objective).await.unwrap();
    let mut task = Task::new(swarm_id, "coding", "hopeless")
        .with_objective(objective.id)
        .with_instructions("fail");
    task.constraints.max_retries = 1;
    // Keep the test fast: one retry, short timeout.
    task.constraints.timeout_secs = 5;
    h.tasks.create(&task).await.unwrap();

    let status = coordinator.execute_objective(objective.id).await.unwrap();
    assert_eq!(status, ObjectiveStatus::Failed);

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.is_some());
}

/// handle_failure marks the agent failed and requeues its task.
#[tokio::test]
async fn test_handle_failure_requeues_task() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;
    let swarm_id = coordinator.swarm_id().await.unwrap();

    let agent_id = coordinator
        .register_agent("w", "coder", vec!["code_generation".to_string()])
        .await
        .unwrap();

    let task = Task::new(swarm_id, "coding", "in flight");
    h.tasks.create(&task).await.unwrap();
    coordinator.assign_task(task.id).await.unwrap();

    coordinator
        .handle_failure(agent_id, "agent crashed")
        .await
        .unwrap();

    let agent = h.agents.get(agent_id).await.unwrap().unwrap();
    assert_eq!(
        agent.status,
        hivemind::domain::models::AgentStatus::Failed
    );

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.assigned_agent_id.is_none());
}

/// Status and metrics reporters aggregate over the swarm.
#[tokio::test]
async fn test_status_and_metrics() {
    let (h, _dir) = harness().await;
    let coordinator = init_coordinator(&h).await;

    coordinator
        .register_agent("w", "coder", vec!["code_generation".to_string()])
        .await
        .unwrap();
    coordinator
        .create_task("coding", "t", "", "x", vec![], 0, None)
        .await
        .unwrap();

    let status = coordinator.swarm_status().await.unwrap();
    assert_eq!(status.agents, 1);
    assert_eq!(status.idle_agents, 1);
    assert_eq!(status.tasks_by_status.get("pending"), Some(&1));

    let metrics: CoordinatorMetrics = coordinator.metrics().await.unwrap();
    assert_eq!(metrics.objectives_total, 0);
    assert_eq!(metrics.tasks_by_status.get("pending"), Some(&1));
}
