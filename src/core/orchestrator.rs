use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::core::fetcher::{FetchError, RepoFetcher};
use crate::core::graph::{build_graph, summarize_health};
use crate::core::record::{AnalysisStatus, CompletedAnalysis};
use crate::core::types::Language;
use crate::core::workspace::Workspace;
use crate::engine::adapter::{AdapterError, AnalysisEngine, AnalyzerAdapter};
use crate::engine::detect::detect_language;
use crate::persistence::record_store::{RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("analysis {0} not found")]
    RecordNotFound(Uuid),
    #[error("analysis {0} already has an active run")]
    LeaseConflict(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Analyze(#[from] AdapterError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("analysis task aborted: {0}")]
    Join(String),
}

fn join_err(e: tokio::task::JoinError) -> StepError {
    StepError::Join(e.to_string())
}

/// Tracks which record ids currently have an active run. At most one run may
/// mutate a record at a time.
struct LeaseRegistry {
    active: Mutex<HashSet<Uuid>>,
}

impl LeaseRegistry {
    fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }

    fn acquire(&self, analysis_id: Uuid) -> Option<LeaseGuard<'_>> {
        let mut active = self.active.lock().ok()?;
        if !active.insert(analysis_id) {
            return None;
        }
        Some(LeaseGuard {
            registry: self,
            analysis_id,
        })
    }
}

struct LeaseGuard<'a> {
    registry: &'a LeaseRegistry,
    analysis_id: Uuid,
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut active) = self.registry.active.lock() {
            active.remove(&self.analysis_id);
        }
    }
}

/// Removes the run directory exactly once per successful fetch, on every exit
/// path of the run, panics included.
struct CleanupGuard {
    fetcher: Arc<dyn RepoFetcher>,
    path: PathBuf,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.fetcher.cleanup(&self.path);
    }
}

/// Drives an analysis record through pending -> processing -> terminal.
/// The orchestrator is the only component that transitions a record's status;
/// both execution strategies end up in [`Orchestrator::run`].
pub struct Orchestrator {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn RepoFetcher>,
    adapter: AnalyzerAdapter,
    workspace: Workspace,
    leases: LeaseRegistry,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn RepoFetcher>,
        engine: Arc<dyn AnalysisEngine>,
        workspace: Workspace,
    ) -> Self {
        Self {
            store,
            fetcher,
            adapter: AnalyzerAdapter::new(engine),
            workspace,
            leases: LeaseRegistry::new(),
        }
    }

    /// Runs the full pipeline for one record and returns the terminal status
    /// it reached. Step failures are recorded on the record, never propagated;
    /// the error return covers only the control plane (unknown id, concurrent
    /// run, unreachable store).
    pub async fn run(
        &self,
        analysis_id: Uuid,
        language_hint: Option<Language>,
    ) -> Result<AnalysisStatus, PipelineError> {
        let _lease = self
            .leases
            .acquire(analysis_id)
            .ok_or(PipelineError::LeaseConflict(analysis_id))?;

        let record = self
            .store
            .get(analysis_id)
            .await?
            .ok_or(PipelineError::RecordNotFound(analysis_id))?;

        self.store.mark_processing(analysis_id).await?;
        tracing::info!(%analysis_id, url = %record.github_url, "analysis started");

        match self
            .execute(analysis_id, &record.github_url, language_hint)
            .await
        {
            Ok(completed) => {
                self.store.complete(analysis_id, &completed).await?;
                tracing::info!(
                    %analysis_id,
                    total_files = completed.total_files,
                    total_loc = completed.total_loc,
                    "analysis completed"
                );
                Ok(AnalysisStatus::Completed)
            }
            Err(err) => {
                tracing::warn!(%analysis_id, error = %err, "analysis failed");
                self.store.fail(analysis_id, &err.to_string()).await?;
                Ok(AnalysisStatus::Failed)
            }
        }
    }

    async fn execute(
        &self,
        analysis_id: Uuid,
        github_url: &str,
        language_hint: Option<Language>,
    ) -> Result<CompletedAnalysis, StepError> {
        let repo_dir = self.workspace.repo_dir(analysis_id, github_url);
        let outcome = {
            let fetcher = Arc::clone(&self.fetcher);
            let url = github_url.to_string();
            tokio::task::spawn_blocking(move || fetcher.fetch(&url, &repo_dir))
                .await
                .map_err(join_err)??
        };

        let _cleanup = CleanupGuard {
            fetcher: Arc::clone(&self.fetcher),
            path: self.workspace.run_dir(analysis_id, github_url),
        };

        if let Some(sha) = &outcome.commit_sha {
            self.store.set_revision(analysis_id, sha).await?;
        }

        let (detected, census) = {
            let repo_root = outcome.repo_root.clone();
            tokio::task::spawn_blocking(move || detect_language(&repo_root))
                .await
                .map_err(join_err)?
        };
        let language = language_hint.unwrap_or(detected);
        self.store
            .set_language(analysis_id, language.as_str(), &census)
            .await?;
        tracing::debug!(%analysis_id, language = %language, "language selected");

        let result = {
            let adapter = self.adapter.clone();
            let repo_root = outcome.repo_root.clone();
            let output_dir = self.workspace.engine_output_dir(analysis_id, github_url);
            tokio::task::spawn_blocking(move || adapter.analyze(&repo_root, &output_dir, language))
                .await
                .map_err(join_err)??
        };

        let graph_data = build_graph(&result.file_metrics, &result.dependencies);
        let health_summary = summarize_health(&graph_data);

        Ok(CompletedAnalysis {
            total_files: result.scanned_files,
            total_loc: result.total_loc,
            metrics: serde_json::Value::Object(result.overall_metrics),
            graph_data,
            health_summary,
        })
    }
}
