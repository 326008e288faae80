use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn is_safe_segment(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 128 {
        return false;
    }
    if !bytes[0].is_ascii_alphanumeric() {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(*b, b'_' | b'.' | b'-'))
}

fn stable_key(value: &str) -> String {
    if is_safe_segment(value) {
        return value.to_string();
    }
    let mut h = Sha256::new();
    h.update(value.as_bytes());
    let digest = hex::encode(h.finalize());
    format!("sha256-{}", &digest[..16])
}

/// Per-run filesystem layout under a single workspace root. Each analysis id
/// gets its own subtree, so concurrent runs never share a directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn run_dir(&self, analysis_id: Uuid, github_url: &str) -> PathBuf {
        self.root
            .join(analysis_id.to_string())
            .join(stable_key(github_url))
    }

    pub fn repo_dir(&self, analysis_id: Uuid, github_url: &str) -> PathBuf {
        self.run_dir(analysis_id, github_url).join("repo")
    }

    pub fn engine_output_dir(&self, analysis_id: Uuid, github_url: &str) -> PathBuf {
        self.run_dir(analysis_id, github_url).join("engine-output")
    }
}
