//! Session manager integration tests: lifecycle, checkpoints, orphan
//! cleanup, archive, export/import.

mod common;

use common::Harness;
use serde_json::json;
use std::collections::HashMap;

use hivemind::domain::errors::DomainError;
use hivemind::domain::models::{
    Agent, AgentRole, AgentStatus, LogLevel, SessionStatus, SwarmStatus, Task, TaskStatus,
};
use hivemind::domain::ports::{
    AgentRepository, SessionRepository, SwarmRepository, TaskRepository,
};

async fn harness() -> (Harness, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path().join("sessions")).await;
    (harness, dir)
}

/// Pause and resume with progress preserved: five tasks in mixed states
/// yield 40% completion, and resuming restores the swarm to active.
#[tokio::test]
async fn test_pause_resume_preserves_progress() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Progress Test Swarm").await;

    let statuses = [
        TaskStatus::Completed,
        TaskStatus::Completed,
        TaskStatus::InProgress,
        TaskStatus::Pending,
        TaskStatus::Pending,
    ];
    for (i, status) in statuses.iter().enumerate() {
        let mut task = Task::new(swarm.id, "coding", format!("task-{}", i + 1));
        task.force_status(*status, "test setup");
        h.tasks.create(&task).await.unwrap();
    }

    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    h.session_manager
        .save_checkpoint(&session_id, "progress-checkpoint", json!({ "tasks": 5 }))
        .await
        .unwrap();

    h.session_manager.pause_session(&session_id).await.unwrap();
    let paused = h.sessions.get(&session_id).await.unwrap().unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);

    h.session_manager.resume_session(&session_id).await.unwrap();

    let full = h.session_manager.get_session(&session_id).await.unwrap();
    assert_eq!(full.statistics.completion_percentage, 40);
    assert_eq!(full.statistics.completed_tasks, 2);
    assert_eq!(full.statistics.in_progress_tasks, 1);
    assert_eq!(full.statistics.pending_tasks, 2);

    let swarm = h.swarms.get(swarm.id).await.unwrap().unwrap();
    assert_eq!(swarm.status, SwarmStatus::Active);
}

/// Orphan cleanup: a session whose parent pid is dead is stopped and a
/// cleanup event is recorded.
#[tokio::test]
async fn test_orphan_cleanup_stops_dead_parent_session() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Swarm A").await;

    let mut session =
        hivemind::domain::models::Session::new(swarm.id, &swarm.name, None);
    // Guaranteed-dead pid.
    session.parent_pid = 99999;
    h.sessions.create(&session).await.unwrap();

    let reclaimed = h
        .session_manager
        .cleanup_orphaned_processes()
        .await
        .unwrap();
    assert_eq!(reclaimed, 1);

    let stopped = h.sessions.get(&session.id).await.unwrap().unwrap();
    assert_eq!(stopped.status, SessionStatus::Stopped);

    let logs = h.sessions.recent_logs(&session.id, 50).await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.message == "Orphaned session cleaned up"));
}

/// A live parent is left alone.
#[tokio::test]
async fn test_orphan_cleanup_ignores_live_parent() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Live").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    let reclaimed = h
        .session_manager
        .cleanup_orphaned_processes()
        .await
        .unwrap();
    assert_eq!(reclaimed, 0);

    let session = h.sessions.get(&session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

/// Archived sessions are gone: resume reports not found.
#[tokio::test]
async fn test_archived_session_cannot_be_resumed() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Archive Me").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    h.session_manager
        .complete_session(&session_id)
        .await
        .unwrap();

    let archived = h.session_manager.archive_sessions(0).await.unwrap();
    assert_eq!(archived, 1);

    // The archive file exists, the row does not.
    let archive_file = h
        .sessions_dir
        .join("archive")
        .join(format!("{session_id}-archive.json"));
    assert!(archive_file.exists());

    let err = h
        .session_manager
        .resume_session(&session_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::SessionNotFound(_)));
}

/// Resume restores queens to active and workers to idle.
#[tokio::test]
async fn test_resume_restores_agent_statuses() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Restore").await;

    let queen = Agent::new(swarm.id, "queen", "coordinator").with_role(AgentRole::Queen);
    let mut worker = Agent::new(swarm.id, "worker", "coder");
    worker.status = AgentStatus::Busy;
    h.agents.create(&queen).await.unwrap();
    h.agents.create(&worker).await.unwrap();

    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();
    h.session_manager.pause_session(&session_id).await.unwrap();
    h.session_manager.resume_session(&session_id).await.unwrap();

    let queen = h.agents.get(queen.id).await.unwrap().unwrap();
    let worker = h.agents.get(worker.id).await.unwrap().unwrap();
    assert_eq!(queen.status, AgentStatus::Active);
    assert_eq!(worker.status, AgentStatus::Idle);
}

/// Resume records the paused duration in the session log.
#[tokio::test]
async fn test_resume_records_paused_duration() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Durations").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    h.session_manager.pause_session(&session_id).await.unwrap();
    h.session_manager.resume_session(&session_id).await.unwrap();

    let logs = h.sessions.recent_logs(&session_id, 50).await.unwrap();
    let resume_log = logs
        .iter()
        .find(|l| l.message == "Session resumed")
        .expect("resume event");
    let data = resume_log.data.as_ref().expect("pausedDuration data");
    assert!(data.get("pausedDuration").is_some());
}

/// A stopped session resumes as a restart, without a paused duration.
#[tokio::test]
async fn test_stopped_session_resumes() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Restart").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    h.session_manager.stop_session(&session_id).await.unwrap();
    let session = h
        .session_manager
        .resume_session(&session_id)
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Active);
}

/// Pause is idempotent; pausing twice succeeds and keeps the first stamp.
#[tokio::test]
async fn test_pause_idempotent() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Idem").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    h.session_manager.pause_session(&session_id).await.unwrap();
    let first = h.sessions.get(&session_id).await.unwrap().unwrap();
    h.session_manager.pause_session(&session_id).await.unwrap();
    let second = h.sessions.get(&session_id).await.unwrap().unwrap();
    assert_eq!(first.paused_at, second.paused_at);
}

/// Child pid tracking is idempotent over adds, and removing an unknown
/// pid succeeds.
#[tokio::test]
async fn test_child_pid_tracking() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Pids").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    h.session_manager.add_child_pid(&session_id, 4001).await.unwrap();
    h.session_manager.add_child_pid(&session_id, 4001).await.unwrap();
    let session = h.sessions.get(&session_id).await.unwrap().unwrap();
    assert_eq!(session.child_pids, vec![4001]);

    h.session_manager
        .remove_child_pid(&session_id, 9876)
        .await
        .unwrap();
    h.session_manager
        .remove_child_pid(&session_id, 4001)
        .await
        .unwrap();
    let session = h.sessions.get(&session_id).await.unwrap().unwrap();
    assert!(session.child_pids.is_empty());
}

/// Checkpoints persist a row, mirror onto the session, and write the
/// sidecar backup file.
#[tokio::test]
async fn test_checkpoint_sidecar_and_mirror() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Checkpointed").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    let data = json!({ "phase": "halfway", "n": 21 });
    h.session_manager
        .save_checkpoint(&session_id, "midpoint", data.clone())
        .await
        .unwrap();

    let session = h.sessions.get(&session_id).await.unwrap().unwrap();
    assert_eq!(session.checkpoint_data, Some(data.clone()));

    let sidecar = h.sessions_dir.join(format!("{session_id}-midpoint.json"));
    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&sidecar).unwrap()).unwrap();
    assert_eq!(on_disk, data);

    let checkpoints = h.sessions.list_checkpoints(&session_id).await.unwrap();
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(checkpoints[0].name, "midpoint");
}

/// Export then import yields a session matching by value with a fresh id.
#[tokio::test]
async fn test_export_import_roundtrip() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Exported").await;

    let agent = Agent::new(swarm.id, "worker", "coder");
    h.agents.create(&agent).await.unwrap();
    let task = Task::new(swarm.id, "coding", "port the parser");
    h.tasks.create(&task).await.unwrap();

    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, Some("port it".into()), HashMap::new())
        .await
        .unwrap();
    h.session_manager
        .save_checkpoint(&session_id, "cp1", json!({ "step": 1 }))
        .await
        .unwrap();

    let path = h
        .session_manager
        .export_session(&session_id, None)
        .await
        .unwrap();
    assert!(path.exists());

    let imported_id = h.session_manager.import_session(&path).await.unwrap();
    assert_ne!(imported_id, session_id);

    let imported = h.session_manager.get_session(&imported_id).await.unwrap();
    assert_eq!(imported.session.swarm_id, swarm.id);
    assert_eq!(imported.session.objective.as_deref(), Some("port it"));
    assert_eq!(imported.tasks.len(), 1);
    assert_eq!(imported.tasks[0].name, "port the parser");
    assert_eq!(imported.agents.len(), 1);
    assert!(imported.checkpoints.iter().any(|c| c.name == "cp1"));
}

/// get_session returns at most the last 50 events, newest first.
#[tokio::test]
async fn test_recent_log_window() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Chatty").await;
    let session_id = h
        .session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    for i in 0..60 {
        h.session_manager
            .log_event(&session_id, LogLevel::Info, &format!("event {i}"), None, None)
            .await
            .unwrap();
    }

    let full = h.session_manager.get_session(&session_id).await.unwrap();
    assert_eq!(full.recent_logs.len(), 50);
    assert_eq!(full.recent_logs[0].message, "event 59");
}

/// Active-session listing aggregates counts and completion.
#[tokio::test]
async fn test_get_active_sessions_aggregates() {
    let (h, _dir) = harness().await;
    let swarm = h.create_swarm("Aggregated").await;

    h.agents
        .create(&Agent::new(swarm.id, "w", "coder"))
        .await
        .unwrap();
    let mut done = Task::new(swarm.id, "coding", "done");
    done.force_status(TaskStatus::Completed, "test setup");
    h.tasks.create(&done).await.unwrap();
    h.tasks
        .create(&Task::new(swarm.id, "coding", "open"))
        .await
        .unwrap();

    h.session_manager
        .create_session(swarm.id, &swarm.name, None, HashMap::new())
        .await
        .unwrap();

    let summaries = h.session_manager.get_active_sessions().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].agent_count, 1);
    assert_eq!(summaries[0].task_count, 2);
    assert_eq!(summaries[0].completed_tasks, 1);
    assert_eq!(summaries[0].completion_percentage, 50);
}
