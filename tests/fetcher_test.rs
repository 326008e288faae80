use git2::{Oid, Repository, Signature};
use std::path::Path;
use std::time::Duration;

use repo_analysis_service::core::fetcher::{FetchError, GitFetcher, RepoFetcher};

fn commit_file(repo: &Repository, rel: &Path, contents: &str, message: &str) -> Oid {
    let workdir = repo.workdir().expect("non-bare repo workdir");
    let abs = workdir.join(rel);
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&abs, contents).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(rel).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = Signature::now("Test", "test@example.com").unwrap();
    let parents: Vec<git2::Commit<'_>> = repo
        .head()
        .ok()
        .and_then(|h| h.target())
        .and_then(|oid| repo.find_commit(oid).ok())
        .into_iter()
        .collect();
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, parent_refs.as_slice())
        .unwrap()
}

#[test]
fn fetch_clones_and_reports_head_commit() {
    let tmp = tempfile::tempdir().unwrap();
    let src_repo = tmp.path().join("src_repo");
    std::fs::create_dir_all(&src_repo).unwrap();
    let repo = Repository::init(&src_repo).unwrap();
    let sha = commit_file(&repo, Path::new("file.txt"), "v1", "c1");

    let fetcher = GitFetcher::new(Duration::from_secs(60));
    let dest = tmp.path().join("checkout");
    let outcome = fetcher
        .fetch(src_repo.to_string_lossy().as_ref(), &dest)
        .unwrap();

    assert_eq!(outcome.repo_root, dest);
    assert_eq!(outcome.commit_sha.as_deref(), Some(sha.to_string().as_str()));
    assert_eq!(
        std::fs::read_to_string(dest.join("file.txt")).unwrap(),
        "v1"
    );
}

#[test]
fn fetch_replaces_a_stale_destination() {
    let tmp = tempfile::tempdir().unwrap();
    let src_repo = tmp.path().join("src_repo");
    std::fs::create_dir_all(&src_repo).unwrap();
    let repo = Repository::init(&src_repo).unwrap();
    commit_file(&repo, Path::new("file.txt"), "fresh", "c1");

    let dest = tmp.path().join("checkout");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("stale.txt"), "leftover").unwrap();

    let fetcher = GitFetcher::new(Duration::from_secs(60));
    fetcher
        .fetch(src_repo.to_string_lossy().as_ref(), &dest)
        .unwrap();

    assert!(!dest.join("stale.txt").exists());
    assert!(dest.join("file.txt").exists());
}

#[test]
fn fetch_failure_cleans_its_own_destination() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("checkout");

    let fetcher = GitFetcher::new(Duration::from_secs(60));
    let err = fetcher
        .fetch(tmp.path().join("does-not-exist").to_string_lossy().as_ref(), &dest)
        .unwrap_err();

    assert!(matches!(err, FetchError::Clone(_)));
    assert!(!dest.exists());
}

#[test]
fn cleanup_removes_the_checkout_and_tolerates_missing_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("checkout");
    std::fs::create_dir_all(dir.join("nested")).unwrap();
    std::fs::write(dir.join("nested/file.txt"), "x").unwrap();

    let fetcher = GitFetcher::new(Duration::from_secs(60));
    fetcher.cleanup(&dir);
    assert!(!dir.exists());

    // Second call must be a no-op, not a panic or an error log storm.
    fetcher.cleanup(&dir);
    assert!(!dir.exists());
}
