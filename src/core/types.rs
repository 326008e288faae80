use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the analysis engine can be pointed at. The string forms and
/// extension sets follow the engine's configuration vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "py")]
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "typescript")]
    TypeScript,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "cpp")]
    Cpp,
    #[serde(rename = "c")]
    C,
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "ruby")]
    Ruby,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::Go,
        Language::Ruby,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Go => "go",
            Language::Ruby => "ruby",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Language::Python => &[".py"],
            Language::JavaScript => &[".js"],
            Language::TypeScript => &[".ts"],
            Language::Java => &[".java"],
            Language::Cpp => &[".cpp", ".cc", ".cxx"],
            Language::C => &[".c", ".h"],
            Language::Go => &[".go"],
            Language::Ruby => &[".rb"],
        }
    }

    pub fn from_extension(ext: &str) -> Option<Language> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext))
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Python
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| format!("unsupported language: {s}"))
    }
}

/// Coarse per-file health classification used by the visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Green,
    Yellow,
    Red,
}

impl HealthTier {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthTier::Green => "green",
            HealthTier::Yellow => "yellow",
            HealthTier::Red => "red",
        }
    }
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
