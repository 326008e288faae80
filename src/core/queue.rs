use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::orchestrator::Orchestrator;
use crate::core::types::Language;

#[derive(Debug, thiserror::Error)]
#[error("failed to enqueue analysis {analysis_id}: {reason}")]
pub struct QueueError {
    pub analysis_id: Uuid,
    pub reason: String,
}

/// Queued execution capability. The accepting boundary hands the record id
/// over and returns immediately; a worker drives the same orchestrator state
/// machine out-of-band.
#[async_trait]
pub trait AnalysisQueue: Send + Sync {
    async fn enqueue(
        &self,
        analysis_id: Uuid,
        language_hint: Option<Language>,
    ) -> Result<(), QueueError>;
}

/// In-process queue: each accepted run becomes a spawned task on the runtime.
pub struct SpawnedRunQueue {
    orchestrator: Arc<Orchestrator>,
}

impl SpawnedRunQueue {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl AnalysisQueue for SpawnedRunQueue {
    async fn enqueue(
        &self,
        analysis_id: Uuid,
        language_hint: Option<Language>,
    ) -> Result<(), QueueError> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            if let Err(err) = orchestrator.run(analysis_id, language_hint).await {
                tracing::error!(%analysis_id, error = %err, "queued analysis run aborted");
            }
        });
        Ok(())
    }
}
