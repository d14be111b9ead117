//! Route handlers. Bodies are validated in full before any storage access.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::middleware::Caller;
use super::AppState;
use crate::memory::consolidate::ConsolidationStats;
use crate::memory::search::{RecallQuery, RecallResponse};
use crate::memory::stats::StatsResponse;
use crate::memory::store::StoreMemoryResult;
use crate::memory::types::{
    MemoryType, NewMemory, DEFAULT_IMPORTANCE, DEFAULT_RECALL_LIMIT, MAX_CONTENT_CHARS,
    MAX_RECALL_LIMIT,
};

#[derive(Debug, Deserialize)]
pub struct RecallRequest {
    pub query: String,
    pub limit: Option<i64>,
    pub types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub importance: Option<f64>,
    pub metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, serde::Serialize)]
pub struct ConsolidateResponse {
    pub consolidated: bool,
    pub stats: ConsolidationStats,
}

fn parse_type(field: &str, raw: &str) -> Result<MemoryType, ApiError> {
    raw.parse().map_err(|_| {
        let allowed: Vec<&str> = MemoryType::ALL.iter().map(|t| t.as_str()).collect();
        ApiError::invalid_field(
            field,
            format!("invalid memory type '{raw}', expected one of: {}", allowed.join(", ")),
        )
    })
}

impl RecallRequest {
    pub fn validate(self) -> Result<RecallQuery, ApiError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(ApiError::invalid_field("query", "query must not be empty"));
        }

        let limit = match self.limit {
            None => DEFAULT_RECALL_LIMIT,
            Some(n) if (1..=MAX_RECALL_LIMIT as i64).contains(&n) => n as usize,
            Some(n) => {
                return Err(ApiError::invalid_field(
                    "limit",
                    format!("limit must be between 1 and {MAX_RECALL_LIMIT}, got {n}"),
                ))
            }
        };

        let mut recall = RecallQuery::new(query).with_limit(limit);
        if let Some(raw) = self.types.filter(|t| !t.is_empty()) {
            let types = raw
                .iter()
                .map(|t| parse_type("types", t))
                .collect::<Result<Vec<_>, _>>()?;
            recall = recall.with_types(types);
        }
        Ok(recall)
    }
}

impl StoreRequest {
    pub fn validate(self) -> Result<NewMemory, ApiError> {
        if self.content.trim().is_empty() {
            return Err(ApiError::invalid_field("content", "content must not be empty"));
        }
        let chars = self.content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(ApiError::invalid_field(
                "content",
                format!("content exceeds {MAX_CONTENT_CHARS} characters ({chars})"),
            ));
        }

        let importance = self.importance.unwrap_or(DEFAULT_IMPORTANCE);
        if !importance.is_finite() || !(0.0..=1.0).contains(&importance) {
            return Err(ApiError::invalid_field(
                "importance",
                "importance must be between 0 and 1",
            ));
        }

        let memory_type = match self.memory_type.as_deref() {
            Some(raw) => parse_type("type", raw)?,
            None => MemoryType::default(),
        };

        Ok(NewMemory {
            content: self.content,
            memory_type,
            importance,
            metadata: self.metadata,
        })
    }
}

/// Run blocking storage work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("storage task failed: {e}"))?;
    Ok(result?)
}

pub async fn recall(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<RecallRequest>, JsonRejection>,
) -> Result<Json<RecallResponse>, ApiError> {
    let Json(request) = payload?;
    let query = request.validate()?;

    let memory = state.memory.clone();
    let user_id = caller.user_id.clone();
    let response = blocking(move || memory.recall(&user_id, &query)).await?;

    tracing::debug!(user_id = %caller.user_id, results = response.results.len(), took_ms = response.took_ms, "recall");
    Ok(Json(response))
}

pub async fn store(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<StoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StoreMemoryResult>), ApiError> {
    let Json(request) = payload?;
    let new_memory = request.validate()?;

    let memory = state.memory.clone();
    let user_id = caller.user_id.clone();
    let result = blocking(move || memory.store(&user_id, &new_memory)).await?;

    tracing::debug!(user_id = %caller.user_id, id = %result.id, "memory stored");
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn consolidate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ConsolidateResponse>, ApiError> {
    let memory = state.memory.clone();
    let user_id = caller.user_id.clone();
    let stats = blocking(move || memory.consolidate(&user_id)).await?;
    Ok(Json(ConsolidateResponse {
        consolidated: true,
        stats,
    }))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<StatsResponse>, ApiError> {
    let memory = state.memory.clone();
    let user_id = caller.user_id;
    let stats = blocking(move || memory.stats(&user_id)).await?;
    Ok(Json(stats))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": crate::memory::now_timestamp(),
    }))
}
