use std::sync::Arc;

use tower_http::{request_id::MakeRequestUuid, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repo_analysis_service::config::Config;
use repo_analysis_service::core::fetcher::{GitFetcher, RepoFetcher};
use repo_analysis_service::core::orchestrator::Orchestrator;
use repo_analysis_service::core::queue::{AnalysisQueue, SpawnedRunQueue};
use repo_analysis_service::core::workspace::Workspace;
use repo_analysis_service::engine::adapter::{AnalysisEngine, ProcessEngine};
use repo_analysis_service::persistence::pg_store::PgRecordStore;
use repo_analysis_service::persistence::record_store::{MemoryRecordStore, RecordStore};
use repo_analysis_service::web::server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env()?;

    let store: Arc<dyn RecordStore> = match &cfg.database_url {
        Some(url) => {
            let store = PgRecordStore::new(url.clone());
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, analysis records are kept in memory only");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let fetcher: Arc<dyn RepoFetcher> = Arc::new(GitFetcher::new(cfg.fetch_timeout));
    let engine: Arc<dyn AnalysisEngine> = Arc::new(ProcessEngine::new(
        cfg.engine_command.clone(),
        cfg.analysis_time_limit,
        cfg.analysis_soft_limit,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        fetcher,
        engine,
        Workspace::new(&cfg.workspace_root),
    ));
    let queue: Option<Arc<dyn AnalysisQueue>> = if cfg.queue_enabled {
        Some(Arc::new(SpawnedRunQueue::new(Arc::clone(&orchestrator))))
    } else {
        None
    };

    let state = AppState {
        store,
        orchestrator,
        queue,
    };

    let app = app(state)
        .layer(TraceLayer::new_for_http())
        .layer(tower_http::request_id::SetRequestIdLayer::x_request_id(
            MakeRequestUuid,
        ))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(64 * 1024));

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("repo-analysis-service listening on {}", cfg.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
