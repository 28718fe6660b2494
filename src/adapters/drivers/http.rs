//! HTTP agent driver.
//!
//! Invokes a remote service: POSTs the instructions, streams the
//! response body back as stdout chunks.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    AgentDriver, DriverChunk, DriverMetadata, DriverStream, Invocation,
};

pub struct HttpDriver {
    client: reqwest::Client,
    endpoint: String,
    cancel_tx: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

impl HttpDriver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            cancel_tx: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl AgentDriver for HttpDriver {
    async fn invoke(&self, invocation: Invocation) -> DomainResult<DriverStream> {
        if invocation.instructions.trim().is_empty() {
            return Err(DomainError::InvalidInstructions(
                "empty instructions".to_string(),
            ));
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        {
            let mut slot = self.cancel_tx.lock().await;
            *slot = Some(cancel_tx);
        }

        let (chunk_tx, chunk_rx) = mpsc::channel::<DriverChunk>(64);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "task_id": invocation.task_id,
                "agent_id": invocation.agent_id,
                "instructions": invocation.instructions,
            }))
            .send();

        tokio::spawn(async move {
            let outcome = async {
                let response = request
                    .await
                    .map_err(|e| DomainError::DriverPanic(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(DomainError::DriverExitedNonZero {
                        code: i32::from(status.as_u16()),
                    });
                }

                let mut body = response.bytes_stream();
                loop {
                    tokio::select! {
                        chunk = body.next() => match chunk {
                            Some(Ok(bytes)) => {
                                let text = String::from_utf8_lossy(&bytes).to_string();
                                let _ = chunk_tx.send(DriverChunk::stdout(text)).await;
                            }
                            Some(Err(e)) => {
                                return Err(DomainError::DriverPanic(e.to_string()));
                            }
                            None => break,
                        },
                        _ = cancel_rx.changed() => {
                            if *cancel_rx.borrow() {
                                return Err(DomainError::DriverPanic("cancelled".to_string()));
                            }
                        }
                    }
                }
                Ok(())
            }
            .await;

            let _ = outcome_tx.send(outcome);
        });

        Ok(DriverStream {
            chunks: chunk_rx,
            outcome: outcome_rx,
        })
    }

    async fn cancel(&self) -> DomainResult<()> {
        let slot = self.cancel_tx.lock().await;
        if let Some(tx) = slot.as_ref() {
            let _ = tx.send(true);
        }
        Ok(())
    }

    fn metadata(&self) -> DriverMetadata {
        DriverMetadata {
            driver_type: "http".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
