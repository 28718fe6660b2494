//! Executor integration tests: retry with backoff, timeout handling,
//! terminal errors, agent release, metrics.

mod common;

use common::Harness;
use std::sync::Arc;
use std::time::Duration;

use hivemind::adapters::drivers::InProcessDriver;
use hivemind::domain::models::{Agent, AgentStatus, Task, TaskStatus};
use hivemind::domain::ports::{AgentRepository, TaskRepository};

async fn harness() -> (Harness, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path().join("sessions")).await;
    (harness, dir)
}

/// Claim the task so it is `assigned` to the agent, as the coordinator
/// would have done.
async fn setup_assigned_task(h: &Harness, max_retries: u32) -> (Task, Agent) {
    let swarm = h.create_swarm("Exec").await;
    let agent = Agent::new(swarm.id, "w", "coder");
    h.agents.create(&agent).await.unwrap();

    let mut task = Task::new(swarm.id, "coding", "work").with_instructions("do it");
    task.constraints.max_retries = max_retries;
    h.tasks.create(&task).await.unwrap();

    let task = h
        .tasks
        .claim_task(task.id, agent.id)
        .await
        .unwrap()
        .unwrap();
    (task, agent)
}

/// Retry exhaustion scenario: a driver failing the first two calls then
/// succeeding finishes completed with attempt_count 3 and backoffs of
/// roughly 1s then 2s.
#[tokio::test(start_paused = true)]
async fn test_retry_until_success() {
    let (h, _dir) = harness().await;
    let (task, agent) = setup_assigned_task(&h, 3).await;

    let driver = Arc::new(InProcessDriver::failing_first(2, vec!["ok".to_string()]));
    let started = tokio::time::Instant::now();
    let result = h
        .executor
        .execute(task.id, agent.id, driver.clone())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(result.success);
    assert_eq!(driver.invocation_count(), 3);

    // Backoffs of 1s then 2s elapsed (virtual time).
    assert!(elapsed >= Duration::from_secs(3), "elapsed: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed: {elapsed:?}");

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.attempt_count, 3);
    assert_eq!(task.progress, 100);
    assert!(task.result.is_some());

    let agent = h.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Idle);
    assert!(agent.current_task_id.is_none());

    let metrics = h.executor.execution_metrics();
    assert_eq!(metrics.total_executions, 1);
    assert_eq!(metrics.successful_executions, 1);
    assert_eq!(metrics.retries, 2);
}

/// A driver that never succeeds exhausts the retry budget and the task
/// fails with the error recorded.
#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_fails_task() {
    let (h, _dir) = harness().await;
    let (task, agent) = setup_assigned_task(&h, 2).await;

    let driver = Arc::new(InProcessDriver::failing_first(u32::MAX, vec![]));
    let result = h.executor.execute(task.id, agent.id, driver).await.unwrap();

    assert!(!result.success);
    assert!(result.error.is_some());

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt_count, 2);
    assert!(task.error.is_some());

    // The agent is released even on failure.
    let agent = h.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Idle);

    let metrics = h.executor.execution_metrics();
    assert_eq!(metrics.failed_executions, 1);
    assert_eq!(metrics.retries, 1);
}

/// Timeouts cancel the driver and consume the retry budget.
#[tokio::test]
async fn test_timeout_consumes_retries() {
    let (h, _dir) = harness().await;
    tokio::time::pause();
    let swarm = h.create_swarm("Slow").await;
    let agent = Agent::new(swarm.id, "w", "coder");
    h.agents.create(&agent).await.unwrap();

    let mut task = Task::new(swarm.id, "coding", "slow").with_instructions("sleep");
    task.constraints.timeout_secs = 1;
    task.constraints.max_retries = 1;
    h.tasks.create(&task).await.unwrap();
    let task = h
        .tasks
        .claim_task(task.id, agent.id)
        .await
        .unwrap()
        .unwrap();

    let driver = Arc::new(
        InProcessDriver::succeeding(vec!["late".to_string()])
            .with_delay(Duration::from_secs(3600)),
    );
    let result = h.executor.execute(task.id, agent.id, driver).await.unwrap();

    assert!(!result.success);
    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.as_deref().unwrap_or("").contains("timed out"));
}

/// Terminal errors (invalid instructions) fail immediately without
/// consuming the retry budget.
#[tokio::test]
async fn test_terminal_error_skips_retries() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Bad").await;
    let agent = Agent::new(swarm.id, "w", "coder");
    h.agents.create(&agent).await.unwrap();

    // Empty instructions are classified InvalidInstructions by drivers.
    let task = Task::new(swarm.id, "coding", "empty");
    h.tasks.create(&task).await.unwrap();
    let task = h
        .tasks
        .claim_task(task.id, agent.id)
        .await
        .unwrap()
        .unwrap();

    let driver = Arc::new(InProcessDriver::succeeding(vec!["unused".to_string()]));
    let result = h.executor.execute(task.id, agent.id, driver).await.unwrap();

    assert!(!result.success);
    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt_count, 1);

    let metrics = h.executor.execution_metrics();
    assert_eq!(metrics.retries, 0);
}

/// Output chunks are captured into the result.
#[tokio::test]
async fn test_output_capture() {
    let (h, _dir) = harness().await;
    let (task, agent) = setup_assigned_task(&h, 3).await;

    let driver = Arc::new(InProcessDriver::succeeding(vec![
        "line one".to_string(),
        "line two".to_string(),
    ]));
    let result = h.executor.execute(task.id, agent.id, driver).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, "line one\nline two");

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.result.unwrap().output, "line one\nline two");
}
