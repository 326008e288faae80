use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::graph::{GraphPayload, HealthSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "processing" => Ok(AnalysisStatus::Processing),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(format!("unknown analysis status: {other}")),
        }
    }
}

/// The persisted unit of work and result for one repository analysis.
/// Result fields stay null until the step that computes them succeeds;
/// `completed_at` is set exactly when the status turns terminal and
/// `error_message` is populated exactly when the status is `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub github_url: String,
    pub repository_name: String,
    pub commit_sha: Option<String>,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub total_files: Option<i64>,
    pub total_loc: Option<i64>,
    pub primary_language: Option<String>,
    pub languages: Option<BTreeMap<String, i64>>,
    pub metrics: Option<serde_json::Value>,
    pub graph_data: Option<GraphPayload>,
    pub health_summary: Option<HealthSummary>,
}

impl AnalysisRecord {
    pub fn new(github_url: impl Into<String>, repository_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            github_url: github_url.into(),
            repository_name: repository_name.into(),
            commit_sha: None,
            status: AnalysisStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
            total_files: None,
            total_loc: None,
            primary_language: None,
            languages: None,
            metrics: None,
            graph_data: None,
            health_summary: None,
        }
    }
}

/// Result fields written together with the `completed` transition.
#[derive(Debug, Clone)]
pub struct CompletedAnalysis {
    pub total_files: i64,
    pub total_loc: i64,
    pub metrics: serde_json::Value,
    pub graph_data: GraphPayload,
    pub health_summary: HealthSummary,
}
