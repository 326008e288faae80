use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use crate::core::record::{AnalysisRecord, AnalysisStatus, CompletedAnalysis};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("analysis {0} not found")]
    NotFound(Uuid),
    #[error("analysis {0} already exists")]
    AlreadyExists(Uuid),
    #[error("illegal status transition for analysis {0}")]
    IllegalTransition(Uuid),
    #[error("record store failure: {0}")]
    Backend(String),
}

/// Identifier-keyed durable storage for analysis records. Partial writes are
/// issued at distinct points in a run; `complete` and `fail` are single
/// atomic writes that also stamp the completion timestamp. Terminal records
/// never transition again.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, record: AnalysisRecord) -> Result<(), StoreError>;

    async fn get(&self, analysis_id: Uuid) -> Result<Option<AnalysisRecord>, StoreError>;

    async fn mark_processing(&self, analysis_id: Uuid) -> Result<(), StoreError>;

    async fn set_revision(&self, analysis_id: Uuid, commit_sha: &str) -> Result<(), StoreError>;

    async fn set_language(
        &self,
        analysis_id: Uuid,
        primary: &str,
        languages: &BTreeMap<String, i64>,
    ) -> Result<(), StoreError>;

    async fn complete(
        &self,
        analysis_id: Uuid,
        outcome: &CompletedAnalysis,
    ) -> Result<(), StoreError>;

    /// Marks the record failed. Partial result fields written earlier in the
    /// run are discarded so a failed record never mixes run fragments.
    async fn fail(&self, analysis_id: Uuid, error_message: &str) -> Result<(), StoreError>;
}

/// Mutex-guarded map store, used by tests and database-less deployments.
pub struct MemoryRecordStore {
    records: Mutex<HashMap<Uuid, AnalysisRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    fn update<F>(&self, analysis_id: Uuid, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut AnalysisRecord) -> Result<(), StoreError>,
    {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("record store mutex poisoned".to_string()))?;
        let record = records
            .get_mut(&analysis_id)
            .ok_or(StoreError::NotFound(analysis_id))?;
        f(record)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: AnalysisRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("record store mutex poisoned".to_string()))?;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, analysis_id: Uuid) -> Result<Option<AnalysisRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("record store mutex poisoned".to_string()))?;
        Ok(records.get(&analysis_id).cloned())
    }

    async fn mark_processing(&self, analysis_id: Uuid) -> Result<(), StoreError> {
        self.update(analysis_id, |record| {
            if record.status != AnalysisStatus::Pending {
                return Err(StoreError::IllegalTransition(analysis_id));
            }
            record.status = AnalysisStatus::Processing;
            Ok(())
        })
    }

    async fn set_revision(&self, analysis_id: Uuid, commit_sha: &str) -> Result<(), StoreError> {
        self.update(analysis_id, |record| {
            if record.status != AnalysisStatus::Processing {
                return Err(StoreError::IllegalTransition(analysis_id));
            }
            record.commit_sha = Some(commit_sha.to_string());
            Ok(())
        })
    }

    async fn set_language(
        &self,
        analysis_id: Uuid,
        primary: &str,
        languages: &BTreeMap<String, i64>,
    ) -> Result<(), StoreError> {
        self.update(analysis_id, |record| {
            if record.status != AnalysisStatus::Processing {
                return Err(StoreError::IllegalTransition(analysis_id));
            }
            record.primary_language = Some(primary.to_string());
            record.languages = Some(languages.clone());
            Ok(())
        })
    }

    async fn complete(
        &self,
        analysis_id: Uuid,
        outcome: &CompletedAnalysis,
    ) -> Result<(), StoreError> {
        self.update(analysis_id, |record| {
            if record.status != AnalysisStatus::Processing {
                return Err(StoreError::IllegalTransition(analysis_id));
            }
            record.status = AnalysisStatus::Completed;
            record.completed_at = Some(Utc::now());
            record.error_message = None;
            record.total_files = Some(outcome.total_files);
            record.total_loc = Some(outcome.total_loc);
            record.metrics = Some(outcome.metrics.clone());
            record.graph_data = Some(outcome.graph_data.clone());
            record.health_summary = Some(outcome.health_summary);
            Ok(())
        })
    }

    async fn fail(&self, analysis_id: Uuid, error_message: &str) -> Result<(), StoreError> {
        self.update(analysis_id, |record| {
            if record.status != AnalysisStatus::Processing {
                return Err(StoreError::IllegalTransition(analysis_id));
            }
            record.status = AnalysisStatus::Failed;
            record.completed_at = Some(Utc::now());
            record.error_message = Some(error_message.to_string());
            record.commit_sha = None;
            record.primary_language = None;
            record.languages = None;
            record.total_files = None;
            record.total_loc = None;
            record.metrics = None;
            record.graph_data = None;
            record.health_summary = None;
            Ok(())
        })
    }
}
