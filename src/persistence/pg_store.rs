use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres::error::SqlState;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::core::record::{AnalysisRecord, AnalysisStatus, CompletedAnalysis};
use crate::persistence::record_store::{RecordStore, StoreError};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS analyses (
    id UUID PRIMARY KEY,
    github_url TEXT NOT NULL,
    repository_name TEXT NOT NULL,
    commit_sha TEXT,
    status TEXT NOT NULL CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
    created_at TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ,
    error_message TEXT,
    total_files BIGINT,
    total_loc BIGINT,
    primary_language TEXT,
    languages JSONB,
    metrics JSONB,
    graph_data JSONB,
    health_summary JSONB,
    graph_sha256 TEXT
);
CREATE INDEX IF NOT EXISTS idx_analyses_status ON analyses (status);
CREATE INDEX IF NOT EXISTS idx_analyses_created_at ON analyses (created_at);
"#;

pub fn canonical_json_bytes(value: &serde_json::Value) -> Vec<u8> {
    // Canonical JSON bytes (sorted keys, no whitespace).
    // serde_json doesn't provide canonicalization directly, so we re-serialize
    // after recursively sorting object keys.
    fn canonicalize(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Object(map) => {
                let mut keys: Vec<_> = map.keys().cloned().collect();
                keys.sort();
                let mut out = serde_json::Map::new();
                for k in keys {
                    out.insert(k.clone(), canonicalize(&map[&k]));
                }
                serde_json::Value::Object(out)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(canonicalize).collect())
            }
            other => other.clone(),
        }
    }

    let canon = canonicalize(value);
    serde_json::to_vec(&canon).expect("json bytes")
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn pg_err(e: postgres::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Backend(format!("stored document does not deserialize: {e}"))
}

fn row_to_record(row: &postgres::Row) -> Result<AnalysisRecord, StoreError> {
    let status: String = row.get("status");
    let status: AnalysisStatus = status.parse().map_err(StoreError::Backend)?;

    let languages: Option<serde_json::Value> = row.get("languages");
    let languages = languages
        .map(serde_json::from_value::<BTreeMap<String, i64>>)
        .transpose()
        .map_err(json_err)?;
    let graph_data: Option<serde_json::Value> = row.get("graph_data");
    let graph_data = graph_data
        .map(serde_json::from_value)
        .transpose()
        .map_err(json_err)?;
    let health_summary: Option<serde_json::Value> = row.get("health_summary");
    let health_summary = health_summary
        .map(serde_json::from_value)
        .transpose()
        .map_err(json_err)?;

    Ok(AnalysisRecord {
        id: row.get("id"),
        github_url: row.get("github_url"),
        repository_name: row.get("repository_name"),
        commit_sha: row.get("commit_sha"),
        status,
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
        completed_at: row.get("completed_at"),
        error_message: row.get("error_message"),
        total_files: row.get("total_files"),
        total_loc: row.get("total_loc"),
        primary_language: row.get("primary_language"),
        languages,
        metrics: row.get("metrics"),
        graph_data,
        health_summary,
    })
}

/// Postgres-backed record store. Each call opens a short-lived synchronous
/// client on the blocking pool; every guarded update is a single UPDATE
/// statement, so terminal writes are atomic with respect to readers.
pub struct PgRecordStore {
    database_url: String,
}

impl PgRecordStore {
    pub fn new(database_url: String) -> Self {
        Self { database_url }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.with_client(|client| client.batch_execute(SCHEMA_SQL).map_err(pg_err))
            .await
    }

    async fn with_client<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut postgres::Client) -> Result<T, StoreError> + Send + 'static,
    {
        let url = self.database_url.clone();
        tokio::task::spawn_blocking(move || {
            let mut client = postgres::Client::connect(&url, postgres::NoTls).map_err(pg_err)?;
            f(&mut client)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }

    /// Guarded update: zero affected rows means the record is either missing
    /// or not in the status the transition requires.
    fn check_affected(analysis_id: Uuid, affected: u64) -> Result<(), StoreError> {
        if affected == 0 {
            return Err(StoreError::IllegalTransition(analysis_id));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create(&self, record: AnalysisRecord) -> Result<(), StoreError> {
        self.with_client(move |client| {
            client
                .execute(
                    r#"
                    INSERT INTO analyses (id, github_url, repository_name, status, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                    &[
                        &record.id,
                        &record.github_url,
                        &record.repository_name,
                        &record.status.as_str(),
                        &record.created_at,
                    ],
                )
                .map_err(|e| {
                    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                        StoreError::AlreadyExists(record.id)
                    } else {
                        pg_err(e)
                    }
                })?;
            Ok(())
        })
        .await
    }

    async fn get(&self, analysis_id: Uuid) -> Result<Option<AnalysisRecord>, StoreError> {
        self.with_client(move |client| {
            let row = client
                .query_opt("SELECT * FROM analyses WHERE id = $1", &[&analysis_id])
                .map_err(pg_err)?;
            row.as_ref().map(row_to_record).transpose()
        })
        .await
    }

    async fn mark_processing(&self, analysis_id: Uuid) -> Result<(), StoreError> {
        self.with_client(move |client| {
            let affected = client
                .execute(
                    "UPDATE analyses SET status = 'processing' WHERE id = $1 AND status = 'pending'",
                    &[&analysis_id],
                )
                .map_err(pg_err)?;
            Self::check_affected(analysis_id, affected)
        })
        .await
    }

    async fn set_revision(&self, analysis_id: Uuid, commit_sha: &str) -> Result<(), StoreError> {
        let commit_sha = commit_sha.to_string();
        self.with_client(move |client| {
            let affected = client
                .execute(
                    "UPDATE analyses SET commit_sha = $2 WHERE id = $1 AND status = 'processing'",
                    &[&analysis_id, &commit_sha],
                )
                .map_err(pg_err)?;
            Self::check_affected(analysis_id, affected)
        })
        .await
    }

    async fn set_language(
        &self,
        analysis_id: Uuid,
        primary: &str,
        languages: &BTreeMap<String, i64>,
    ) -> Result<(), StoreError> {
        let primary = primary.to_string();
        let languages = serde_json::to_value(languages).map_err(json_err)?;
        self.with_client(move |client| {
            let affected = client
                .execute(
                    r#"
                    UPDATE analyses SET primary_language = $2, languages = $3
                    WHERE id = $1 AND status = 'processing'
                    "#,
                    &[&analysis_id, &primary, &languages],
                )
                .map_err(pg_err)?;
            Self::check_affected(analysis_id, affected)
        })
        .await
    }

    async fn complete(
        &self,
        analysis_id: Uuid,
        outcome: &CompletedAnalysis,
    ) -> Result<(), StoreError> {
        let total_files = outcome.total_files;
        let total_loc = outcome.total_loc;
        let metrics = outcome.metrics.clone();
        let graph_data = serde_json::to_value(&outcome.graph_data).map_err(json_err)?;
        let health_summary = serde_json::to_value(outcome.health_summary).map_err(json_err)?;
        let graph_sha256 = sha256_hex(&canonical_json_bytes(&graph_data));
        let completed_at = Utc::now();
        self.with_client(move |client| {
            let affected = client
                .execute(
                    r#"
                    UPDATE analyses SET
                        status = 'completed',
                        completed_at = $2,
                        total_files = $3,
                        total_loc = $4,
                        metrics = $5,
                        graph_data = $6,
                        health_summary = $7,
                        graph_sha256 = $8
                    WHERE id = $1 AND status = 'processing'
                    "#,
                    &[
                        &analysis_id,
                        &completed_at,
                        &total_files,
                        &total_loc,
                        &metrics,
                        &graph_data,
                        &health_summary,
                        &graph_sha256,
                    ],
                )
                .map_err(pg_err)?;
            Self::check_affected(analysis_id, affected)
        })
        .await
    }

    async fn fail(&self, analysis_id: Uuid, error_message: &str) -> Result<(), StoreError> {
        let error_message = error_message.to_string();
        let completed_at = Utc::now();
        self.with_client(move |client| {
            let affected = client
                .execute(
                    r#"
                    UPDATE analyses SET
                        status = 'failed',
                        completed_at = $2,
                        error_message = $3,
                        commit_sha = NULL,
                        primary_language = NULL,
                        languages = NULL,
                        total_files = NULL,
                        total_loc = NULL,
                        metrics = NULL,
                        graph_data = NULL,
                        health_summary = NULL,
                        graph_sha256 = NULL
                    WHERE id = $1 AND status = 'processing'
                    "#,
                    &[&analysis_id, &completed_at, &error_message],
                )
                .map_err(pg_err)?;
            Self::check_affected(analysis_id, affected)
        })
        .await
    }
}
