//! Auto-save middleware.
//!
//! A per-session adjunct that buffers observed mutations and flushes
//! them as consolidated checkpoints: periodically, on critical events,
//! and on demand. The buffer is cleared only on successful persistence;
//! a failed flush retries on the next tick.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::domain::errors::DomainResult;
use crate::services::events::EventBus;
use crate::services::session_manager::SessionManager;
use crate::domain::models::LogLevel;

/// Change kinds that trigger an immediate flush.
const CRITICAL_KINDS: &[&str] = &["task_completed", "agent_spawned", "consensus_reached"];

#[derive(Debug, Clone, Serialize)]
struct TrackedChange {
    kind: String,
    /// ISO-8601 timestamp recorded at track time.
    timestamp: String,
    data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveStatistics {
    tasks_processed: u64,
    tasks_completed: u64,
    memory_updates: u64,
    agent_activities: u64,
    consensus_decisions: u64,
}

struct Inner {
    session_id: String,
    session_manager: Arc<SessionManager>,
    buffer: Mutex<Vec<TrackedChange>>,
    statistics: Mutex<SaveStatistics>,
}

impl Inner {
    async fn track(&self, kind: &str, data: serde_json::Value) {
        {
            let mut stats = self.statistics.lock().await;
            match kind {
                "task_progress" => stats.tasks_processed += 1,
                "task_completed" => stats.tasks_completed += 1,
                "memory_updated" => stats.memory_updates += 1,
                "agent_activity" | "agent_spawned" => stats.agent_activities += 1,
                "consensus_reached" => stats.consensus_decisions += 1,
                _ => {}
            }
        }

        let mut buffer = self.buffer.lock().await;
        buffer.push(TrackedChange {
            kind: kind.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            data,
        });
    }

    /// Flush the buffer into an `auto-save-<epochMs>` checkpoint. A
    /// no-op on an empty buffer. Returns whether a checkpoint was
    /// written.
    async fn flush(&self) -> DomainResult<bool> {
        let snapshot: Vec<TrackedChange> = {
            let buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return Ok(false);
            }
            buffer.clone()
        };
        let flushed = snapshot.len();

        let mut changes_by_type: std::collections::HashMap<String, u64> =
            std::collections::HashMap::new();
        for change in &snapshot {
            *changes_by_type.entry(change.kind.clone()).or_insert(0) += 1;
        }

        let statistics = *self.statistics.lock().await;
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "changeCount": flushed,
            "changesByType": changes_by_type,
            "statistics": statistics,
        });

        let name = format!("auto-save-{}", Utc::now().timestamp_millis());
        self.session_manager
            .save_checkpoint(&self.session_id, &name, payload)
            .await?;

        // Completion percentage is recomputed from the latest progress
        // entry in the buffer.
        if let Some(pct) = snapshot
            .iter()
            .rev()
            .filter(|c| c.kind == "task_progress")
            .find_map(|c| c.data.get("percentage").and_then(serde_json::Value::as_u64))
        {
            #[allow(clippy::cast_possible_truncation)]
            self.session_manager
                .update_session_progress(&self.session_id, pct.min(100) as u8)
                .await?;
        }

        for change in &snapshot {
            self.session_manager
                .log_event(
                    &self.session_id,
                    LogLevel::Debug,
                    &format!("Change tracked: {}", change.kind),
                    None,
                    Some(change.data.clone()),
                )
                .await?;
        }

        // Only now drop the flushed prefix; changes tracked during the
        // flush stay buffered for the next one.
        {
            let mut buffer = self.buffer.lock().await;
            let drain_to = flushed.min(buffer.len());
            buffer.drain(..drain_to);
        }

        tracing::debug!(
            session_id = %self.session_id,
            checkpoint = %name,
            changes = flushed,
            "Auto-save flushed"
        );
        Ok(true)
    }
}

pub struct AutoSaveMiddleware {
    inner: Arc<Inner>,
    events: Arc<EventBus>,
    interval: Duration,
    enabled: bool,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AutoSaveMiddleware {
    pub fn new(
        session_id: impl Into<String>,
        session_manager: Arc<SessionManager>,
        events: Arc<EventBus>,
        interval: Duration,
        enabled: bool,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                session_id: session_id.into(),
                session_manager,
                buffer: Mutex::new(Vec::new()),
                statistics: Mutex::new(SaveStatistics::default()),
            }),
            events,
            interval,
            enabled,
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    /// Install the periodic flush timer and the event subscription.
    /// Disabled middleware (test mode) never starts the loop.
    pub async fn start(&self) {
        if !self.enabled {
            tracing::debug!("Auto-save disabled; not starting");
            return;
        }

        let inner = self.inner.clone();
        let interval = self.interval;
        let mut event_rx = self.events.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = inner.flush().await {
                            tracing::warn!(error = %e, "Periodic auto-save failed; buffer retained");
                        }
                    }
                    event = event_rx.recv() => match event {
                        Ok(envelope) => {
                            let kind = envelope.event.kind();
                            let data = serde_json::to_value(&envelope.event)
                                .unwrap_or(serde_json::Value::Null);
                            inner.track(kind, data).await;
                            if envelope.event.is_critical() {
                                if let Err(e) = inner.flush().await {
                                    tracing::warn!(error = %e, "Critical-event auto-save failed; buffer retained");
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Auto-save lagged behind event bus");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        let mut slot = self.handle.lock().await;
        *slot = Some(handle);
    }

    /// Cancel the timer and perform a final flush.
    pub async fn stop(&self) -> DomainResult<()> {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
        self.inner.flush().await?;
        Ok(())
    }

    /// Record a mutation. Critical kinds flush immediately.
    pub async fn track_change(&self, kind: &str, data: serde_json::Value) -> DomainResult<()> {
        self.inner.track(kind, data).await;
        if CRITICAL_KINDS.contains(&kind) {
            self.inner.flush().await?;
        }
        Ok(())
    }

    pub async fn track_task_progress(
        &self,
        completed: usize,
        total: usize,
    ) -> DomainResult<()> {
        let percentage =
            crate::domain::models::SessionStatistics::percentage(completed, total);
        self.track_change(
            "task_progress",
            serde_json::json!({
                "completed": completed,
                "total": total,
                "percentage": percentage,
            }),
        )
        .await
    }

    pub async fn track_agent_activity(
        &self,
        agent_id: uuid::Uuid,
        activity: &str,
    ) -> DomainResult<()> {
        self.track_change(
            "agent_activity",
            serde_json::json!({ "agentId": agent_id, "activity": activity }),
        )
        .await
    }

    pub async fn track_memory_update(&self, namespace: &str, key: &str) -> DomainResult<()> {
        self.track_change(
            "memory_updated",
            serde_json::json!({ "namespace": namespace, "key": key }),
        )
        .await
    }

    pub async fn track_consensus_decision(&self, topic: &str) -> DomainResult<()> {
        self.track_change("consensus_reached", serde_json::json!({ "topic": topic }))
            .await
    }

    /// Synchronous flush.
    pub async fn force_save(&self) -> DomainResult<bool> {
        self.inner.flush().await
    }

    pub async fn pending_changes(&self) -> usize {
        self.inner.buffer.lock().await.len()
    }
}
