use regex::Regex;

/// Canonical (organization, repository) pair extracted from a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReference {
    pub org: String,
    pub name: String,
}

impl RepoReference {
    pub fn canonical_name(&self) -> String {
        format!("{}/{}", self.org, self.name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error(
    "invalid repository reference {input:?}: expected https://github.com/org/repo or git@github.com:org/repo.git"
)]
pub struct InvalidReference {
    pub input: String,
}

fn re_https() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://github\.com/([A-Za-z0-9_-]+)/([A-Za-z0-9_.-]+?)(\.git)?/?$").unwrap()
    })
}

fn re_ssh() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^git@github\.com:([A-Za-z0-9_-]+)/([A-Za-z0-9_.-]+?)(\.git)?$").unwrap()
    })
}

/// Validates a repository reference and extracts its org/name pair.
///
/// Accepts the HTTPS form (optionally suffixed with `.git` or a trailing
/// slash) and the SSH form. The `.git` suffix is stripped after extraction,
/// so a repository literally named `my.repo.name` survives intact.
/// Performs no I/O.
pub fn validate_repo_reference(input: &str) -> Result<RepoReference, InvalidReference> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvalidReference {
            input: input.to_string(),
        });
    }

    let caps = re_https()
        .captures(trimmed)
        .or_else(|| re_ssh().captures(trimmed))
        .ok_or_else(|| InvalidReference {
            input: input.to_string(),
        })?;

    let org = caps[1].to_string();
    let mut name = caps[2].to_string();
    if let Some(stripped) = name.strip_suffix(".git") {
        name = stripped.to_string();
    }

    Ok(RepoReference { org, name })
}

/// Non-throwing companion to [`validate_repo_reference`].
pub fn is_valid_repo_reference(input: &str) -> bool {
    validate_repo_reference(input).is_ok()
}
