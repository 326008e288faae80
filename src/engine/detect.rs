use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::core::types::Language;

// Deterministic defaults, mirrored from the ingestion-side ignore list.
// Build output and vendored trees would otherwise dominate the census.
const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    // VCS
    ".git/**",
    ".hg/**",
    ".svn/**",
    // Python
    "__pycache__/**",
    "*.pyc",
    "*.pyo",
    ".venv/**",
    "venv/**",
    // Node
    "node_modules/**",
    // Build output
    "target/**",
    "build/**",
    "dist/**",
    "out/**",
    // IDE / OS junk
    ".idea/**",
    ".vscode/**",
    "*.swp",
    "Thumbs.db",
    "Desktop.ini",
];

fn build_ignore(repo_root: &Path) -> Gitignore {
    let mut b = GitignoreBuilder::new(repo_root);
    for pat in DEFAULT_IGNORE_PATTERNS {
        let _ = b.add_line(None, pat);
    }
    let gitignore_path = repo_root.join(".gitignore");
    if let Ok(text) = std::fs::read_to_string(&gitignore_path) {
        for line in text.lines() {
            let _ = b.add_line(None, line);
        }
    }
    b.build().unwrap_or_else(|_| Gitignore::empty())
}

fn to_posix_rel_path(repo_root: &Path, p: &Path) -> Option<String> {
    let rel = p.strip_prefix(repo_root).ok()?;
    let mut out = String::new();
    for (i, c) in rel.components().enumerate() {
        let s = match c {
            Component::Normal(os) => os.to_string_lossy(),
            _ => continue,
        };
        if i > 0 {
            out.push('/');
        }
        out.push_str(&s);
    }
    Some(out)
}

fn extension_of(rel_path: &str) -> Option<&str> {
    rel_path.rfind('.').map(|idx| &rel_path[idx..])
}

/// Counts recognized source files by extension across the fetched tree and
/// returns the dominant language plus the per-language census. Falls back to
/// Python when nothing matches.
pub fn detect_language(repo_root: &Path) -> (Language, BTreeMap<String, i64>) {
    let ignore = build_ignore(repo_root);

    let mut counts: BTreeMap<Language, i64> = BTreeMap::new();
    for entry in walkdir::WalkDir::new(repo_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = to_posix_rel_path(repo_root, entry.path()) else {
            continue;
        };
        if ignore.matched(&rel, false).is_ignore() {
            continue;
        }
        let Some(language) = extension_of(&rel).and_then(Language::from_extension) else {
            continue;
        };
        *counts.entry(language).or_insert(0) += 1;
    }

    let mut dominant = Language::default();
    let mut best = 0;
    for (language, count) in &counts {
        if *count > best {
            best = *count;
            dominant = *language;
        }
    }

    let census = counts
        .into_iter()
        .map(|(language, count)| (language.as_str().to_string(), count))
        .collect();

    (dominant, census)
}
