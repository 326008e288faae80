use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read analysis result {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("analysis result {} is not valid JSON: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMetrics {
    pub loc: i64,
    pub methods: i64,
}

/// Engine-agnostic view of one analysis run. Maps are BTree-ordered so every
/// consumer downstream produces identical output for identical input.
#[derive(Debug, Clone, Default)]
pub struct NormalizedAnalysisResult {
    pub analysis_name: String,
    pub scanned_files: i64,
    pub total_loc: i64,
    pub overall_metrics: serde_json::Map<String, Value>,
    pub file_metrics: BTreeMap<String, FileMetrics>,
    pub dependencies: BTreeMap<String, Vec<String>>,
}

/// Reads the engine's primary result document. Fails only when the document
/// is not valid JSON; absent fields degrade to zero/empty.
pub fn parse_result_file(path: &Path) -> Result<NormalizedAnalysisResult, ParseError> {
    let data = std::fs::read(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Value = serde_json::from_slice(&data).map_err(|source| ParseError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    let scanned_files = doc
        .pointer("/statistics/scanned_files")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let overall_metrics = doc
        .get("overall-metrics")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let total_loc = overall_metrics
        .get("total-sloc-in-files")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let mut file_metrics = BTreeMap::new();
    if let Some(local) = doc.get("local-metrics").and_then(Value::as_object) {
        for (file_path, metrics) in local {
            if file_path.is_empty() {
                continue;
            }
            file_metrics.insert(
                file_path.clone(),
                FileMetrics {
                    loc: metrics
                        .get("sloc-in-file")
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                    methods: metrics
                        .get("number-of-methods-in-file")
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                },
            );
        }
    }

    let analysis_name = doc
        .get("analysis-name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(NormalizedAnalysisResult {
        analysis_name,
        scanned_files,
        total_loc,
        overall_metrics,
        file_metrics,
        dependencies: BTreeMap::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyOutcome {
    Loaded { edge_count: usize },
    Missing,
    Unreadable(String),
}

#[derive(Debug, Clone)]
pub struct DependencyData {
    pub edges: BTreeMap<String, Vec<String>>,
    pub outcome: DependencyOutcome,
}

fn re_edge_tag() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<edge\b[^>]*>").unwrap())
}

fn re_source_attr() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bsource\s*=\s*"([^"]*)""#).unwrap())
}

fn re_target_attr() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\btarget\s*=\s*"([^"]*)""#).unwrap())
}

/// Extracts dependency edges from the optional graph artifact. This data is
/// best-effort by contract: a missing or unreadable artifact degrades to an
/// empty edge map, and edge tags without both endpoints are skipped.
pub fn parse_dependency_artifact(path: Option<&Path>) -> DependencyData {
    let Some(path) = path else {
        return DependencyData {
            edges: BTreeMap::new(),
            outcome: DependencyOutcome::Missing,
        };
    };

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            return DependencyData {
                edges: BTreeMap::new(),
                outcome: DependencyOutcome::Unreadable(e.to_string()),
            }
        }
    };

    let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut edge_count = 0;
    for tag in re_edge_tag().find_iter(&text) {
        let tag = tag.as_str();
        let source = re_source_attr()
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        let target = re_target_attr()
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        let (Some(source), Some(target)) = (source, target) else {
            continue;
        };
        if source.is_empty() || target.is_empty() {
            continue;
        }
        edges
            .entry(source.to_string())
            .or_default()
            .push(target.to_string());
        edge_count += 1;
    }

    DependencyData {
        edges,
        outcome: DependencyOutcome::Loaded { edge_count },
    }
}
