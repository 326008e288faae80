use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::orchestrator::Orchestrator;
use crate::core::queue::AnalysisQueue;
use crate::core::record::{AnalysisRecord, AnalysisStatus};
use crate::core::reference::validate_repo_reference;
use crate::core::types::Language;
use crate::persistence::record_store::{RecordStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub orchestrator: Arc<Orchestrator>,
    /// When present, accepted runs are handed to the queue and the caller
    /// polls. When absent, the run executes inline within the request.
    pub queue: Option<Arc<dyn AnalysisQueue>>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub github_url: String,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisStatus,
    pub estimated_time: i64,
    pub message: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(start_analysis))
        .route("/api/analysis/{analysis_id}", get(get_analysis))
        .with_state(Arc::new(state))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn start_analysis(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    let Json(payload) = payload.map_err(|_e| ApiError::unprocessable("invalid json body"))?;
    let reference = validate_repo_reference(&payload.github_url)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let record = AnalysisRecord::new(payload.github_url.clone(), reference.canonical_name());
    let analysis_id = record.id;
    state.store.create(record).await.map_err(ApiError::from_store)?;

    let (status, estimated_time, message) = match &state.queue {
        Some(queue) => {
            queue
                .enqueue(analysis_id, payload.language)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            (
                AnalysisStatus::Pending,
                45,
                "Analysis queued successfully".to_string(),
            )
        }
        None => {
            let status = state
                .orchestrator
                .run(analysis_id, payload.language)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            (status, 0, format!("Analysis {status}"))
        }
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            analysis_id,
            status,
            estimated_time,
            message,
        }),
    ))
}

async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<AnalysisRecord>, ApiError> {
    match state
        .store
        .get(analysis_id)
        .await
        .map_err(ApiError::from_store)?
    {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::not_found(format!(
            "analysis {analysis_id} not found"
        ))),
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    fn from_store(err: StoreError) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}
