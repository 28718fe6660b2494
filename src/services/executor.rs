//! Task executor.
//!
//! Runs one task on one agent: invokes the agent's driver with a
//! deadline, streams output into a bounded ring buffer, retries with
//! exponential backoff, and always releases the agent.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentStatus, Task, TaskResult, TaskStatus};
use crate::domain::ports::{AgentDriver, AgentRepository, Invocation, TaskRepository};
use crate::services::events::{EventBus, SwarmEvent};

/// Output capture cap. Oldest chunks are evicted once exceeded.
const OUTPUT_BUFFER_CAP: usize = 64 * 1024;

/// Structured outcome of one task execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub artifacts: HashMap<String, serde_json::Value>,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Running counters, queryable via `execution_metrics`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutionMetrics {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub total_duration_ms: u64,
    pub retries: u64,
}

#[derive(Default)]
struct MetricCounters {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    duration_ms: AtomicU64,
    retries: AtomicU64,
}

/// Bounded ring buffer over output chunks.
struct OutputBuffer {
    chunks: VecDeque<String>,
    bytes: usize,
    cap: usize,
}

impl OutputBuffer {
    fn new(cap: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            bytes: 0,
            cap,
        }
    }

    fn push(&mut self, chunk: String) {
        self.bytes += chunk.len();
        self.chunks.push_back(chunk);
        while self.bytes > self.cap {
            if let Some(evicted) = self.chunks.pop_front() {
                self.bytes -= evicted.len();
            } else {
                break;
            }
        }
    }

    fn into_string(self) -> String {
        let mut out = String::with_capacity(self.bytes);
        for (i, chunk) in self.chunks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(chunk);
        }
        out
    }
}

/// Scoped acquisition of an agent. Every exit path from execution
/// releases the agent: explicitly via `release`/`disarm`, or from `Drop`
/// when the execution future panics or is cancelled.
pub struct AgentLease {
    agent_id: Uuid,
    agent_repo: Arc<dyn AgentRepository>,
    released: bool,
}

impl AgentLease {
    pub async fn acquire(
        agent_repo: Arc<dyn AgentRepository>,
        agent_id: Uuid,
        task_id: Uuid,
    ) -> DomainResult<Self> {
        agent_repo
            .update_status(agent_id, AgentStatus::Busy, Some(task_id))
            .await?;
        Ok(Self {
            agent_id,
            agent_repo,
            released: false,
        })
    }

    /// Persist a final status and consume the lease.
    pub async fn release(mut self, status: AgentStatus) -> DomainResult<()> {
        self.released = true;
        self.agent_repo
            .update_status(self.agent_id, status, None)
            .await
    }

    /// Mark released without writing (the release already happened in a
    /// transaction elsewhere).
    pub fn disarm(mut self) {
        self.released = true;
    }
}

impl Drop for AgentLease {
    fn drop(&mut self) {
        if !self.released {
            let repo = self.agent_repo.clone();
            let agent_id = self.agent_id;
            tokio::spawn(async move {
                if let Err(e) = repo.update_status(agent_id, AgentStatus::Idle, None).await {
                    tracing::warn!(agent_id = %agent_id, error = %e, "Failed to release agent from lease drop");
                }
            });
        }
    }
}

pub struct TaskExecutor {
    task_repo: Arc<dyn TaskRepository>,
    agent_repo: Arc<dyn AgentRepository>,
    events: Arc<EventBus>,
    metrics: MetricCounters,
}

impl TaskExecutor {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            task_repo,
            agent_repo,
            events,
            metrics: MetricCounters::default(),
        }
    }

    pub fn execution_metrics(&self) -> ExecutionMetrics {
        ExecutionMetrics {
            total_executions: self.metrics.total.load(Ordering::SeqCst),
            successful_executions: self.metrics.successful.load(Ordering::SeqCst),
            failed_executions: self.metrics.failed.load(Ordering::SeqCst),
            total_duration_ms: self.metrics.duration_ms.load(Ordering::SeqCst),
            retries: self.metrics.retries.load(Ordering::SeqCst),
        }
    }

    /// Execute one task on one agent. The task must have its
    /// dependencies satisfied and be `assigned`; the agent `active`.
    pub async fn execute(
        &self,
        task_id: Uuid,
        agent_id: Uuid,
        driver: Arc<dyn AgentDriver>,
    ) -> DomainResult<ExecutionResult> {
        let mut task = self
            .task_repo
            .get(task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        task.transition_to(TaskStatus::InProgress)
            .map_err(|_| DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: TaskStatus::InProgress.as_str().to_string(),
            })?;
        self.task_repo.update(&task).await?;

        let lease = AgentLease::acquire(self.agent_repo.clone(), agent_id, task_id).await?;

        let metadata = driver.metadata();
        tracing::debug!(
            task_id = %task_id,
            agent_id = %agent_id,
            driver = %metadata.driver_type,
            driver_version = %metadata.version,
            "Executing task"
        );

        self.events.publish(SwarmEvent::TaskStarted { task_id, agent_id });
        self.metrics.total.fetch_add(1, Ordering::SeqCst);

        let started = tokio::time::Instant::now();
        let outcome = self.run_with_retries(&mut task, agent_id, driver).await;
        let duration = started.elapsed();
        self.metrics
            .duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);

        match outcome {
            Ok(output) => {
                let result = TaskResult {
                    output: output.clone(),
                    artifacts: HashMap::new(),
                    duration_ms: duration.as_millis() as u64,
                };
                // Completion and agent release are one transaction.
                self.task_repo
                    .complete_and_release(task.id, agent_id, &result)
                    .await?;
                lease.disarm();

                self.metrics.successful.fetch_add(1, Ordering::SeqCst);
                self.events.publish(SwarmEvent::TaskCompleted {
                    task_id,
                    duration_ms: duration.as_millis() as u64,
                });

                Ok(ExecutionResult {
                    success: true,
                    output,
                    artifacts: HashMap::new(),
                    duration,
                    error: None,
                })
            }
            Err(e) => {
                let message = e.to_string();
                task.error = Some(message.clone());
                task.force_status(TaskStatus::Failed, "retry budget exhausted or terminal error");
                self.task_repo.update(&task).await?;
                lease.release(AgentStatus::Idle).await?;

                self.metrics.failed.fetch_add(1, Ordering::SeqCst);
                self.events.publish(SwarmEvent::TaskFailed {
                    task_id,
                    error: message.clone(),
                    attempt: task.attempt_count,
                });

                Ok(ExecutionResult {
                    success: false,
                    output: String::new(),
                    artifacts: HashMap::new(),
                    duration,
                    error: Some(message),
                })
            }
        }
    }

    /// Drive attempts until success, a terminal error, or retry
    /// exhaustion. Backoff: base 1s, factor 2, cap 60s.
    async fn run_with_retries(
        &self,
        task: &mut Task,
        agent_id: Uuid,
        driver: Arc<dyn AgentDriver>,
    ) -> DomainResult<String> {
        let mut policy = ExponentialBackoff {
            current_interval: Duration::from_secs(1),
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        loop {
            task.attempt_count += 1;
            self.task_repo.update(task).await?;

            match self.attempt(task, agent_id, driver.clone()).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    if !task.can_retry() {
                        return Err(e);
                    }

                    // Reschedule: back to pending, wait out the backoff,
                    // then take the task again.
                    let backoff = policy.next_backoff().unwrap_or(Duration::from_secs(60));
                    tracing::warn!(
                        task_id = %task.id,
                        attempt = task.attempt_count,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Task attempt failed; retrying"
                    );
                    self.events.publish(SwarmEvent::TaskRetrying {
                        task_id: task.id,
                        attempt: task.attempt_count,
                        backoff_ms: backoff.as_millis() as u64,
                    });

                    task.force_status(TaskStatus::Pending, "retry reschedule");
                    self.task_repo.update(task).await?;
                    self.metrics.retries.fetch_add(1, Ordering::SeqCst);

                    tokio::time::sleep(backoff).await;

                    task.force_status(TaskStatus::InProgress, "retry attempt");
                    self.task_repo.update(task).await?;
                }
            }
        }
    }

    /// One driver invocation with deadline and output capture.
    async fn attempt(
        &self,
        task: &Task,
        agent_id: Uuid,
        driver: Arc<dyn AgentDriver>,
    ) -> DomainResult<String> {
        let timeout = Duration::from_secs(task.constraints.timeout_secs);
        let invocation = Invocation {
            task_id: task.id,
            agent_id,
            instructions: task.instructions.clone(),
        };

        let stream = driver.invoke(invocation).await?;
        let crate::domain::ports::DriverStream { mut chunks, outcome } = stream;
        let mut buffer = OutputBuffer::new(OUTPUT_BUFFER_CAP);

        let consume = async {
            while let Some(chunk) = chunks.recv().await {
                buffer.push(chunk.data);
            }
            outcome
                .await
                .map_err(|_| DomainError::DriverPanic("driver dropped without outcome".to_string()))?
        };

        let outcome = tokio::time::timeout(timeout, consume).await;
        match outcome {
            Ok(Ok(())) => Ok(buffer.into_string()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                if let Err(e) = driver.cancel().await {
                    tracing::warn!(task_id = %task.id, error = %e, "Driver cancel after timeout failed");
                }
                Err(DomainError::DriverTimeout(task.constraints.timeout_secs))
            }
        }
    }
}
