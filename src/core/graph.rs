use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::HealthTier;
use crate::engine::parser::FileMetrics;

/// Joins the endpoints of an edge into its identifier. Chosen to not collide
/// with characters that appear in file paths.
const EDGE_ID_SEPARATOR: &str = "___";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub path: String,
    pub loc: i64,
    pub methods: i64,
    /// Proxy metric, equal to the method count.
    pub complexity: i64,
    pub health: HealthTier,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub green: i64,
    pub yellow: i64,
    pub red: i64,
}

const LANGUAGE_SUFFIXES: &[(&str, &str)] = &[
    (".py", "Python"),
    (".js", "JavaScript"),
    (".ts", "TypeScript"),
    (".java", "Java"),
    (".cpp", "C++"),
    (".c", "C"),
    (".go", "Go"),
    (".rb", "Ruby"),
    (".kt", "Kotlin"),
    (".swift", "Swift"),
];

fn display_language(file_name: &str) -> &'static str {
    for (suffix, language) in LANGUAGE_SUFFIXES {
        if file_name.ends_with(suffix) {
            return language;
        }
    }
    "Unknown"
}

/// Final path segment, whichever separator convention produced the path.
pub fn display_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

pub fn health_score(methods: i64, loc: i64) -> i64 {
    let mut score = 100;
    if methods > 30 {
        score -= 30;
    } else if methods > 15 {
        score -= 15;
    }
    if loc > 500 {
        score -= 25;
    } else if loc > 300 {
        score -= 10;
    }
    score.max(0)
}

pub fn health_tier(methods: i64, loc: i64) -> HealthTier {
    match health_score(methods, loc) {
        s if s >= 80 => HealthTier::Green,
        s if s >= 60 => HealthTier::Yellow,
        _ => HealthTier::Red,
    }
}

fn file_node(path: &str, metrics: &FileMetrics) -> GraphNode {
    let label = display_name(path);
    GraphNode {
        id: path.to_string(),
        label: label.to_string(),
        kind: "file".to_string(),
        data: NodeData {
            path: path.to_string(),
            loc: metrics.loc,
            methods: metrics.methods,
            complexity: metrics.methods,
            health: health_tier(metrics.methods, metrics.loc),
            language: display_language(label).to_string(),
        },
    }
}

/// Builds the visualization graph from per-file metrics and the dependency
/// adjacency map. Deterministic for identical input: nodes follow the sorted
/// metric keys, edges follow the sorted sources with duplicates for the same
/// ordered pair collapsed. Edges whose endpoints were not scanned are still
/// emitted; the renderer tolerates dangling edges.
pub fn build_graph(
    file_metrics: &BTreeMap<String, FileMetrics>,
    dependencies: &BTreeMap<String, Vec<String>>,
) -> GraphPayload {
    let mut nodes = Vec::with_capacity(file_metrics.len());
    for (path, metrics) in file_metrics {
        nodes.push(file_node(path, metrics));
    }

    let mut edges = Vec::new();
    let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
    for (source, targets) in dependencies {
        for target in targets {
            if !seen.insert((source.as_str(), target.as_str())) {
                continue;
            }
            edges.push(GraphEdge {
                id: format!("{source}{EDGE_ID_SEPARATOR}{target}"),
                source: source.clone(),
                target: target.clone(),
                kind: "imports".to_string(),
            });
        }
    }

    GraphPayload { nodes, edges }
}

pub fn summarize_health(graph: &GraphPayload) -> HealthSummary {
    let mut summary = HealthSummary::default();
    for node in &graph.nodes {
        match node.data.health {
            HealthTier::Green => summary.green += 1,
            HealthTier::Yellow => summary.yellow += 1,
            HealthTier::Red => summary.red += 1,
        }
    }
    summary
}
