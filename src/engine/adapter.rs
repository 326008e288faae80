use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::Language;
use crate::engine::config::{engine_config, EngineConfig};
use crate::engine::parser::{
    parse_dependency_artifact, parse_result_file, DependencyOutcome, NormalizedAnalysisResult,
    ParseError,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to write engine configuration: {0}")]
    Config(String),
    #[error("failed to launch analysis engine `{command}`: {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },
    #[error("analysis engine exited with status {code:?}")]
    Exited { code: Option<i32> },
    #[error("analysis timed out after {0} seconds")]
    Timeout(u64),
    #[error("no analysis result document under {}", .0.display())]
    OutputMissing(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Output(#[from] ParseError),
}

/// The external static-analysis engine, consumed as a black box: it accepts a
/// configuration document and populates the export directory named in it.
pub trait AnalysisEngine: Send + Sync {
    fn run(&self, config: &EngineConfig) -> Result<(), EngineError>;
}

/// Runs the engine as a child process with a wall-clock deadline. A warning is
/// logged once at the soft limit; at the hard limit the child is killed and
/// the run fails with a timeout error.
pub struct ProcessEngine {
    command: String,
    hard_limit: Duration,
    soft_limit: Duration,
}

impl ProcessEngine {
    pub fn new(command: String, hard_limit: Duration, soft_limit: Duration) -> Self {
        Self {
            command,
            hard_limit,
            soft_limit,
        }
    }
}

impl AnalysisEngine for ProcessEngine {
    fn run(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let config_file = tempfile::Builder::new()
            .prefix("engine-config-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        serde_json::to_writer_pretty(config_file.as_file(), config)
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let mut child = Command::new(&self.command)
            .arg("--config")
            .arg(config_file.path())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| EngineError::Launch {
                command: self.command.clone(),
                source,
            })?;

        let started = Instant::now();
        let mut warned = false;
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                return Err(EngineError::Exited {
                    code: status.code(),
                });
            }
            let elapsed = started.elapsed();
            if elapsed >= self.hard_limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Timeout(self.hard_limit.as_secs()));
            }
            if !warned && elapsed >= self.soft_limit {
                warned = true;
                tracing::warn!(
                    elapsed_secs = elapsed.as_secs(),
                    limit_secs = self.hard_limit.as_secs(),
                    "analysis nearing its time limit"
                );
            }
            std::thread::sleep(Duration::from_millis(200));
        }
    }
}

/// Locates the engine's structured result document in the export directory.
pub fn locate_result_file(output_dir: &Path) -> Result<PathBuf, EngineError> {
    let mut json_files: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    json_files.sort();
    json_files
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::OutputMissing(output_dir.to_path_buf()))
}

/// Best-effort lookup of the companion dependency-graph artifact.
pub fn locate_dependency_file(output_dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(output_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "graphml")
                && p.file_name()
                    .is_some_and(|name| name.to_string_lossy().contains("filesystem"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Builds the engine configuration, drives the engine and normalizes its
/// output. Dependency data is optional and degrades to empty; everything else
/// is fatal for the run.
#[derive(Clone)]
pub struct AnalyzerAdapter {
    engine: Arc<dyn AnalysisEngine>,
}

impl AnalyzerAdapter {
    pub fn new(engine: Arc<dyn AnalysisEngine>) -> Self {
        Self { engine }
    }

    pub fn analyze(
        &self,
        repo_root: &Path,
        output_dir: &Path,
        language: Language,
    ) -> Result<NormalizedAnalysisResult, AdapterError> {
        std::fs::create_dir_all(output_dir).map_err(EngineError::Io)?;

        let config = engine_config(repo_root, output_dir, language);
        self.engine.run(&config)?;

        let result_file = locate_result_file(output_dir)?;
        let mut result = parse_result_file(&result_file)?;

        let dependency_file = locate_dependency_file(output_dir);
        let dependencies = parse_dependency_artifact(dependency_file.as_deref());
        match &dependencies.outcome {
            DependencyOutcome::Loaded { edge_count } => {
                tracing::debug!(edge_count, "dependency artifact loaded");
            }
            DependencyOutcome::Missing => {
                tracing::warn!(
                    output_dir = %output_dir.display(),
                    "no dependency artifact exported, graph will have no edges"
                );
            }
            DependencyOutcome::Unreadable(reason) => {
                tracing::warn!(%reason, "dependency artifact unreadable, continuing without edges");
            }
        }
        result.dependencies = dependencies.edges;

        Ok(result)
    }
}
