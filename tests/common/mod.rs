//! Shared test harness: repositories and services over an in-memory
//! migrated pool.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use hivemind::adapters::sqlite::{
    create_migrated_test_pool, SqliteAgentRepository, SqliteObjectiveRepository,
    SqliteSessionRepository, SqliteSwarmRepository, SqliteTaskRepository,
};
use hivemind::domain::models::Swarm;
use hivemind::domain::ports::{
    AgentDriver, AgentRepository, ObjectiveRepository, SessionRepository, SwarmRepository,
    TaskRepository,
};
use hivemind::services::{
    CoordinatorConfig, EventBus, SessionManager, SwarmCoordinator, TaskExecutor,
};

pub struct Harness {
    pub pool: sqlx::SqlitePool,
    pub swarms: Arc<dyn SwarmRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub objectives: Arc<dyn ObjectiveRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub session_manager: Arc<SessionManager>,
    pub events: Arc<EventBus>,
    pub executor: Arc<TaskExecutor>,
    pub sessions_dir: PathBuf,
}

impl Harness {
    pub async fn new(sessions_dir: PathBuf) -> Self {
        let pool = create_migrated_test_pool().await.unwrap();

        let swarms: Arc<dyn SwarmRepository> = Arc::new(SqliteSwarmRepository::new(pool.clone()));
        let agents: Arc<dyn AgentRepository> = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let objectives: Arc<dyn ObjectiveRepository> =
            Arc::new(SqliteObjectiveRepository::new(pool.clone()));
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let sessions: Arc<dyn SessionRepository> =
            Arc::new(SqliteSessionRepository::new(pool.clone()));

        let session_manager = Arc::new(SessionManager::new(
            sessions.clone(),
            swarms.clone(),
            agents.clone(),
            tasks.clone(),
            sessions_dir.clone(),
        ));

        let events = Arc::new(EventBus::default());
        let executor = Arc::new(TaskExecutor::new(
            tasks.clone(),
            agents.clone(),
            events.clone(),
        ));

        Self {
            pool,
            swarms,
            agents,
            objectives,
            tasks,
            sessions,
            session_manager,
            events,
            executor,
            sessions_dir,
        }
    }

    pub async fn create_swarm(&self, name: &str) -> Swarm {
        let swarm = Swarm::new(name);
        self.swarms.create(&swarm).await.unwrap();
        swarm
    }

    pub fn coordinator(
        &self,
        driver: Arc<dyn AgentDriver>,
        config: CoordinatorConfig,
    ) -> SwarmCoordinator {
        SwarmCoordinator::new(
            self.swarms.clone(),
            self.agents.clone(),
            self.objectives.clone(),
            self.tasks.clone(),
            self.executor.clone(),
            self.events.clone(),
            driver,
            config,
        )
    }
}
