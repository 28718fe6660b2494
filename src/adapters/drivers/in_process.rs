//! In-process agent driver for tests.
//!
//! Scripted outcomes with a programmable failure count: the driver fails
//! the first N invocations, then succeeds. Retry behavior is exercised
//! against this.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    AgentDriver, DriverChunk, DriverMetadata, DriverStream, Invocation,
};

pub struct InProcessDriver {
    /// Chunks emitted on a successful invocation.
    output: Vec<String>,
    /// Fail this many invocations before succeeding.
    failures_before_success: u32,
    /// Sleep before completing, to exercise timeouts.
    delay: Option<Duration>,
    invocations: Arc<AtomicU32>,
}

impl InProcessDriver {
    pub fn succeeding(output: Vec<String>) -> Self {
        Self {
            output,
            failures_before_success: 0,
            delay: None,
            invocations: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing_first(failures: u32, output: Vec<String>) -> Self {
        Self {
            output,
            failures_before_success: failures,
            delay: None,
            invocations: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `invoke` has been called.
    pub fn invocation_count(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentDriver for InProcessDriver {
    async fn invoke(&self, invocation: Invocation) -> DomainResult<DriverStream> {
        if invocation.instructions.trim().is_empty() {
            return Err(DomainError::InvalidInstructions(
                "empty instructions".to_string(),
            ));
        }

        let call = self.invocations.fetch_add(1, Ordering::SeqCst);
        let should_fail = call < self.failures_before_success;

        let (chunk_tx, chunk_rx) = mpsc::channel::<DriverChunk>(16);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let output = self.output.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if should_fail {
                let _ = chunk_tx
                    .send(DriverChunk::stderr("simulated failure"))
                    .await;
                drop(chunk_tx);
                let _ = outcome_tx.send(Err(DomainError::DriverExitedNonZero { code: 1 }));
                return;
            }

            for line in output {
                let _ = chunk_tx.send(DriverChunk::stdout(line)).await;
            }
            drop(chunk_tx);
            let _ = outcome_tx.send(Ok(()));
        });

        Ok(DriverStream {
            chunks: chunk_rx,
            outcome: outcome_rx,
        })
    }

    async fn cancel(&self) -> DomainResult<()> {
        Ok(())
    }

    fn metadata(&self) -> DriverMetadata {
        DriverMetadata {
            driver_type: "in_process".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn invocation() -> Invocation {
        Invocation {
            task_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            instructions: "run".to_string(),
        }
    }

    #[tokio::test]
    async fn test_succeeding_driver() {
        let driver = InProcessDriver::succeeding(vec!["a".into(), "b".into()]);
        let mut stream = driver.invoke(invocation()).await.unwrap();

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.chunks.recv().await {
            chunks.push(chunk.data);
        }
        assert_eq!(chunks, vec!["a", "b"]);
        assert!(stream.outcome.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_fails_first_n_then_succeeds() {
        let driver = InProcessDriver::failing_first(2, vec!["ok".into()]);

        for _ in 0..2 {
            let mut stream = driver.invoke(invocation()).await.unwrap();
            while stream.chunks.recv().await.is_some() {}
            assert!(stream.outcome.await.unwrap().is_err());
        }

        let mut stream = driver.invoke(invocation()).await.unwrap();
        while stream.chunks.recv().await.is_some() {}
        assert!(stream.outcome.await.unwrap().is_ok());
        assert_eq!(driver.invocation_count(), 3);
    }
}
