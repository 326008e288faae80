mod common;

use std::time::Duration;

use common::{canned_graphml, canned_result, create_pending, harness, FakeEngine, FakeEngineBehavior, FakeFetcher};
use repo_analysis_service::core::orchestrator::PipelineError;
use repo_analysis_service::core::record::AnalysisStatus;
use repo_analysis_service::core::types::{HealthTier, Language};
use repo_analysis_service::persistence::record_store::{RecordStore, StoreError};

const URL: &str = "https://github.com/acme/widgets";

fn healthy_engine() -> FakeEngine {
    FakeEngine {
        behavior: FakeEngineBehavior::Write {
            result: canned_result(&[("src/a.py", 120, 8), ("src/b.py", 700, 35)]),
            graphml: Some(canned_graphml(&[("src/a.py", "src/b.py")])),
        },
    }
}

fn python_files() -> Vec<(&'static str, &'static str)> {
    vec![("src/a.py", "print(1)\n"), ("src/b.py", "print(2)\n")]
}

#[tokio::test]
async fn successful_run_reaches_completed_with_all_result_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(tmp.path(), FakeFetcher::with_files(python_files()), healthy_engine());
    let id = create_pending(&h.store, URL).await;

    let status = h.orchestrator.run(id, None).await.unwrap();
    assert_eq!(status, AnalysisStatus::Completed);

    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, AnalysisStatus::Completed);
    assert!(record.completed_at.is_some());
    assert!(record.error_message.is_none());
    assert_eq!(record.commit_sha.as_deref(), Some("0123456789abcdef0123456789abcdef01234567"));
    assert_eq!(record.primary_language.as_deref(), Some("py"));
    assert_eq!(record.total_files, Some(2));
    assert_eq!(record.total_loc, Some(820));

    let graph = record.graph_data.unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].id, "src/a.py___src/b.py");
    let red = graph.nodes.iter().find(|n| n.id == "src/b.py").unwrap();
    assert_eq!(red.data.health, HealthTier::Red);

    let summary = record.health_summary.unwrap();
    assert_eq!((summary.green, summary.yellow, summary.red), (1, 0, 1));
}

#[tokio::test]
async fn cleanup_runs_exactly_once_on_success() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(tmp.path(), FakeFetcher::with_files(python_files()), healthy_engine());
    let id = create_pending(&h.store, URL).await;

    h.orchestrator.run(id, None).await.unwrap();

    let cleanups = h.cleanups.lock().unwrap();
    assert_eq!(cleanups.len(), 1);
    assert!(!cleanups[0].exists());
}

#[tokio::test]
async fn cleanup_runs_exactly_once_when_the_engine_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(
        tmp.path(),
        FakeFetcher::with_files(python_files()),
        FakeEngine {
            behavior: FakeEngineBehavior::Exit,
        },
    );
    let id = create_pending(&h.store, URL).await;

    let status = h.orchestrator.run(id, None).await.unwrap();
    assert_eq!(status, AnalysisStatus::Failed);
    assert_eq!(h.cleanups.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn fetch_failure_fails_the_record_without_cleanup() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(tmp.path(), FakeFetcher::failing(), healthy_engine());
    let id = create_pending(&h.store, URL).await;

    let status = h.orchestrator.run(id, None).await.unwrap();
    assert_eq!(status, AnalysisStatus::Failed);

    let record = h.store.get(id).await.unwrap().unwrap();
    assert!(record.completed_at.is_some());
    let message = record.error_message.unwrap();
    assert!(message.contains("failed to clone repository"), "{message}");
    assert!(h.cleanups.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_engine_output_fails_the_record() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(
        tmp.path(),
        FakeFetcher::with_files(python_files()),
        FakeEngine {
            behavior: FakeEngineBehavior::WriteNothing,
        },
    );
    let id = create_pending(&h.store, URL).await;

    let status = h.orchestrator.run(id, None).await.unwrap();
    assert_eq!(status, AnalysisStatus::Failed);

    let record = h.store.get(id).await.unwrap().unwrap();
    let message = record.error_message.unwrap();
    assert!(message.contains("no analysis result document"), "{message}");
}

#[tokio::test]
async fn timeout_failures_carry_a_distinct_error_detail() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(
        tmp.path(),
        FakeFetcher::with_files(python_files()),
        FakeEngine {
            behavior: FakeEngineBehavior::Timeout,
        },
    );
    let id = create_pending(&h.store, URL).await;

    let status = h.orchestrator.run(id, None).await.unwrap();
    assert_eq!(status, AnalysisStatus::Failed);

    let record = h.store.get(id).await.unwrap().unwrap();
    let message = record.error_message.unwrap();
    assert!(message.contains("timed out"), "{message}");
}

#[tokio::test]
async fn failed_runs_discard_partially_computed_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(
        tmp.path(),
        FakeFetcher::with_files(python_files()),
        FakeEngine {
            behavior: FakeEngineBehavior::Exit,
        },
    );
    let id = create_pending(&h.store, URL).await;

    h.orchestrator.run(id, None).await.unwrap();

    // The revision and language were written mid-run, before the engine step
    // failed; a failed record must not keep those fragments.
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, AnalysisStatus::Failed);
    assert!(record.commit_sha.is_none());
    assert!(record.primary_language.is_none());
    assert!(record.languages.is_none());
    assert!(record.graph_data.is_none());
    assert!(record.error_message.is_some());
}

#[tokio::test]
async fn missing_revision_does_not_abort_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let mut fetcher = FakeFetcher::with_files(python_files());
    fetcher.commit_sha = None;
    let h = harness(tmp.path(), fetcher, healthy_engine());
    let id = create_pending(&h.store, URL).await;

    let status = h.orchestrator.run(id, None).await.unwrap();
    assert_eq!(status, AnalysisStatus::Completed);

    let record = h.store.get(id).await.unwrap().unwrap();
    assert!(record.commit_sha.is_none());
    assert_eq!(record.total_files, Some(2));
}

#[tokio::test]
async fn language_hint_overrides_detection() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(tmp.path(), FakeFetcher::with_files(python_files()), healthy_engine());
    let id = create_pending(&h.store, URL).await;

    let status = h.orchestrator.run(id, Some(Language::Java)).await.unwrap();
    assert_eq!(status, AnalysisStatus::Completed);

    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.primary_language.as_deref(), Some("java"));
    // The census still reflects what is actually in the tree.
    assert_eq!(record.languages.unwrap()["py"], 2);
}

#[tokio::test]
async fn concurrent_runs_for_one_record_yield_exactly_one_lease_conflict() {
    let tmp = tempfile::tempdir().unwrap();
    let mut fetcher = FakeFetcher::with_files(python_files());
    fetcher.delay = Some(Duration::from_millis(300));
    let h = harness(tmp.path(), fetcher, healthy_engine());
    let id = create_pending(&h.store, URL).await;

    let (first, second) = tokio::join!(
        h.orchestrator.run(id, None),
        h.orchestrator.run(id, None)
    );

    let conflicts = [&first, &second]
        .iter()
        .filter(|r| matches!(r, Err(PipelineError::LeaseConflict(_))))
        .count();
    assert_eq!(conflicts, 1, "{first:?} / {second:?}");

    let winner = if first.is_ok() { first } else { second };
    assert_eq!(winner.unwrap(), AnalysisStatus::Completed);
}

#[tokio::test]
async fn unknown_record_is_a_control_plane_error() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(tmp.path(), FakeFetcher::with_files(python_files()), healthy_engine());

    let err = h.orchestrator.run(uuid::Uuid::new_v4(), None).await.unwrap_err();
    assert!(matches!(err, PipelineError::RecordNotFound(_)));
}

#[tokio::test]
async fn terminal_records_never_run_again() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(tmp.path(), FakeFetcher::with_files(python_files()), healthy_engine());
    let id = create_pending(&h.store, URL).await;

    h.orchestrator.run(id, None).await.unwrap();
    let err = h.orchestrator.run(id, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Store(StoreError::IllegalTransition(_))
    ));

    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, AnalysisStatus::Completed);
}
