#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use repo_analysis_service::core::fetcher::{FetchError, FetchOutcome, RepoFetcher};
use repo_analysis_service::core::orchestrator::Orchestrator;
use repo_analysis_service::core::queue::{AnalysisQueue, SpawnedRunQueue};
use repo_analysis_service::core::record::AnalysisRecord;
use repo_analysis_service::core::workspace::Workspace;
use repo_analysis_service::engine::adapter::{AnalysisEngine, EngineError};
use repo_analysis_service::engine::config::EngineConfig;
use repo_analysis_service::persistence::record_store::{MemoryRecordStore, RecordStore};
use repo_analysis_service::web::server::AppState;

/// Fetcher that materializes a fixed file set instead of cloning, and records
/// every cleanup call it receives.
pub struct FakeFetcher {
    pub files: Vec<(&'static str, &'static str)>,
    pub commit_sha: Option<String>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub cleanups: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeFetcher {
    pub fn with_files(files: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            files,
            commit_sha: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
            fail: false,
            delay: None,
            cleanups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        let mut fetcher = Self::with_files(Vec::new());
        fetcher.fail = true;
        fetcher
    }
}

impl RepoFetcher for FakeFetcher {
    fn fetch(&self, _github_url: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(FetchError::Clone(git2::Error::from_str(
                "remote repository not found",
            )));
        }
        for (rel, contents) in &self.files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, contents).unwrap();
        }
        std::fs::create_dir_all(dest).unwrap();
        Ok(FetchOutcome {
            repo_root: dest.to_path_buf(),
            commit_sha: self.commit_sha.clone(),
        })
    }

    fn cleanup(&self, path: &Path) {
        self.cleanups.lock().unwrap().push(path.to_path_buf());
        let _ = std::fs::remove_dir_all(path);
    }
}

pub enum FakeEngineBehavior {
    /// Write the canned result document, and optionally a dependency artifact.
    Write {
        result: Value,
        graphml: Option<String>,
    },
    /// Succeed without producing any output.
    WriteNothing,
    /// Fail with a nonzero exit status.
    Exit,
    /// Fail with a timeout.
    Timeout,
}

pub struct FakeEngine {
    pub behavior: FakeEngineBehavior,
}

impl AnalysisEngine for FakeEngine {
    fn run(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let out = &config.analyses[0].export.directory;
        std::fs::create_dir_all(out).unwrap();
        match &self.behavior {
            FakeEngineBehavior::Write { result, graphml } => {
                std::fs::write(
                    out.join("analysis-result.json"),
                    serde_json::to_vec_pretty(result).unwrap(),
                )
                .unwrap();
                if let Some(graphml) = graphml {
                    std::fs::write(out.join("analysis-filesystem-graph.graphml"), graphml)
                        .unwrap();
                }
                Ok(())
            }
            FakeEngineBehavior::WriteNothing => Ok(()),
            FakeEngineBehavior::Exit => Err(EngineError::Exited { code: Some(2) }),
            FakeEngineBehavior::Timeout => Err(EngineError::Timeout(600)),
        }
    }
}

/// Engine result document with one entry per (path, loc, methods) triple.
pub fn canned_result(files: &[(&str, i64, i64)]) -> Value {
    let mut local = serde_json::Map::new();
    let mut total_loc = 0;
    for (path, loc, methods) in files {
        total_loc += loc;
        local.insert(
            path.to_string(),
            json!({
                "sloc-in-file": loc,
                "number-of-methods-in-file": methods,
            }),
        );
    }
    json!({
        "analysis-name": "code_analysis",
        "statistics": { "scanned_files": files.len() },
        "overall-metrics": { "total-sloc-in-files": total_loc },
        "local-metrics": local,
    })
}

pub fn canned_graphml(edges: &[(&str, &str)]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n\
         <graph edgedefault=\"directed\">\n",
    );
    for (i, (source, target)) in edges.iter().enumerate() {
        out.push_str(&format!(
            "  <edge id=\"e{i}\" source=\"{source}\" target=\"{target}\" />\n"
        ));
    }
    out.push_str("</graph>\n</graphml>\n");
    out
}

pub struct Harness {
    pub store: Arc<MemoryRecordStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub cleanups: Arc<Mutex<Vec<PathBuf>>>,
}

pub fn harness(workspace_root: &Path, fetcher: FakeFetcher, engine: FakeEngine) -> Harness {
    let cleanups = Arc::clone(&fetcher.cleanups);
    let store = Arc::new(MemoryRecordStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::new(fetcher),
        Arc::new(engine),
        Workspace::new(workspace_root),
    ));
    Harness {
        store,
        orchestrator,
        cleanups,
    }
}

pub fn app_state(harness: &Harness, queued: bool) -> AppState {
    let queue: Option<Arc<dyn AnalysisQueue>> = if queued {
        Some(Arc::new(SpawnedRunQueue::new(Arc::clone(
            &harness.orchestrator,
        ))))
    } else {
        None
    };
    AppState {
        store: Arc::clone(&harness.store) as Arc<dyn RecordStore>,
        orchestrator: Arc::clone(&harness.orchestrator),
        queue,
    }
}

pub async fn create_pending(store: &MemoryRecordStore, github_url: &str) -> Uuid {
    let record = AnalysisRecord::new(github_url, "acme/widgets");
    let analysis_id = record.id;
    store.create(record).await.unwrap();
    analysis_id
}
