use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::types::Language;

/// Configuration document handed to the external analysis engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    pub project_name: String,
    pub loglevel: String,
    pub analyses: Vec<AnalysisUnit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisUnit {
    pub analysis_name: String,
    pub source_directory: PathBuf,
    pub only_permit_languages: Vec<String>,
    pub only_permit_file_extensions: Vec<String>,
    pub file_scan: Vec<String>,
    pub export: ExportDirective,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportDirective {
    pub directory: PathBuf,
    pub formats: Vec<String>,
}

/// One analysis unit over `repo_root`, scanning only files of `language`,
/// requesting method counts, source line counts and the dependency graph,
/// exported into `output_dir` as a structured result plus a graph document.
pub fn engine_config(repo_root: &Path, output_dir: &Path, language: Language) -> EngineConfig {
    EngineConfig {
        project_name: "analysis".to_string(),
        loglevel: "info".to_string(),
        analyses: vec![AnalysisUnit {
            analysis_name: "code_analysis".to_string(),
            source_directory: repo_root.to_path_buf(),
            only_permit_languages: vec![language.as_str().to_string()],
            only_permit_file_extensions: language
                .extensions()
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            file_scan: vec![
                "number_of_methods".to_string(),
                "source_lines_of_code".to_string(),
                "dependency_graph".to_string(),
            ],
            export: ExportDirective {
                directory: output_dir.to_path_buf(),
                formats: vec!["json".to_string(), "graphml".to_string()],
            },
        }],
    }
}
