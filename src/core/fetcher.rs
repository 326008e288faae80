use git2::build::RepoBuilder;
use git2::{FetchOptions, RemoteCallbacks};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to clone repository: {0}")]
    Clone(#[from] git2::Error),
    #[error("repository fetch timed out after {0} seconds")]
    Timeout(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub repo_root: PathBuf,
    /// HEAD commit id. Resolution failure is tolerated and degrades to None.
    pub commit_sha: Option<String>,
}

pub trait RepoFetcher: Send + Sync {
    fn fetch(&self, github_url: &str, dest: &Path) -> Result<FetchOutcome, FetchError>;

    /// Removes a previously fetched checkout. Must tolerate a missing path.
    fn cleanup(&self, path: &Path);
}

fn rmtree_retry(path: &Path, attempts: usize, delay: Duration) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut last_err: Option<std::io::Error> = None;
    for _ in 0..attempts {
        match std::fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(e) => {
                last_err = Some(e);
                sleep(delay);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::other("failed to remove dir")))
}

/// Shallow single-revision clone via libgit2, bounded by a wall-clock timeout
/// enforced from the transfer-progress callback.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl RepoFetcher for GitFetcher {
    fn fetch(&self, github_url: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
        if dest.exists() {
            rmtree_retry(dest, 30, Duration::from_millis(100))?;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let deadline = Instant::now() + self.timeout;
        let expired = Arc::new(AtomicBool::new(false));
        let mut callbacks = RemoteCallbacks::new();
        {
            let expired = Arc::clone(&expired);
            callbacks.transfer_progress(move |_| {
                if Instant::now() >= deadline {
                    expired.store(true, Ordering::Relaxed);
                    return false;
                }
                true
            });
        }

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        // Local sources (test fixtures, mirrors) clone via the local path
        // optimization, which does not negotiate depth.
        if !Path::new(github_url).exists() {
            fetch_options.depth(1);
        }

        let repo = match RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(github_url, dest)
        {
            Ok(repo) => repo,
            Err(e) => {
                let _ = rmtree_retry(dest, 5, Duration::from_millis(100));
                if expired.load(Ordering::Relaxed) {
                    return Err(FetchError::Timeout(self.timeout.as_secs()));
                }
                return Err(FetchError::Clone(e));
            }
        };

        let commit_sha = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| oid.to_string());

        Ok(FetchOutcome {
            repo_root: dest.to_path_buf(),
            commit_sha,
        })
    }

    fn cleanup(&self, path: &Path) {
        if let Err(e) = rmtree_retry(path, 30, Duration::from_millis(100)) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove fetched checkout");
        }
    }
}
