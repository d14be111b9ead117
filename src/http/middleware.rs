//! Bearer-key authentication and quota enforcement for `/api/v1/*`.
//!
//! [`authenticate`] resolves the key to a [`Caller`] and stores it in request
//! extensions; [`enforce_quota`] runs after it and stamps rate-limit headers on
//! every response it lets through.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use std::sync::Arc;

use super::error::{ApiError, HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET};
use super::AppState;
use crate::auth::hash_key;
use crate::auth::rate_limit::{check_quota, QuotaDecision, Tier};

/// API key header prefix
pub const AUTH_HEADER_PREFIX: &str = "Bearer ";

/// The authenticated identity behind a request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub key_id: String,
    pub user_id: String,
    pub tier: Tier,
}

/// Extract the token from `Authorization: Bearer <key>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(AUTH_HEADER_PREFIX))
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// Resolve the bearer key; unknown and revoked keys fail closed.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key_hash = bearer_token(request.headers())
        .map(hash_key)
        .ok_or(ApiError::Unauthorized(
            "missing or malformed Authorization header, expected: Bearer <api_key>",
        ))?;

    let keys = Arc::clone(&state.keys);
    let record = tokio::task::spawn_blocking(move || keys.find_by_hash(&key_hash))
        .await
        .map_err(|e| anyhow::anyhow!("key lookup task failed: {e}"))??;

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => return Err(ApiError::Unauthorized("invalid API key")),
    };

    // Best-effort: the request proceeds without waiting on this write.
    let keys = Arc::clone(&state.keys);
    let key_id = record.id.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = keys.touch_last_used(&key_id, Utc::now()) {
            tracing::warn!(key_id = %key_id, error = %e, "failed to update key last_used_at");
        }
    });

    tracing::debug!(key_id = %record.id, user_id = %record.user_id, "request authenticated");
    request.extensions_mut().insert(Caller {
        key_id: record.id,
        user_id: record.user_id,
        tier: record.tier,
    });
    Ok(next.run(request).await)
}

/// Apply the caller's tier ceiling over the sliding window.
pub async fn enforce_quota(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<Caller>()
        .cloned()
        .ok_or(ApiError::Unauthorized("request was not authenticated"))?;

    let limit = state.tiers.limit_for(caller.tier);
    let policy = state.quota_failure;
    let keys = Arc::clone(&state.keys);
    let key_id = caller.key_id.clone();
    let decision = tokio::task::spawn_blocking(move || {
        check_quota(keys.as_ref(), &key_id, limit, policy, Utc::now())
    })
    .await
    .map_err(|e| anyhow::anyhow!("quota task failed: {e}"))?;

    match decision {
        QuotaDecision::Exceeded { reset_at } => Err(ApiError::RateLimited { reset_at }),
        QuotaDecision::Allowed { remaining, reset_at } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            headers.insert(HEADER_RATE_LIMIT_RESET, HeaderValue::from(reset_at));
            Ok(response)
        }
    }
}
