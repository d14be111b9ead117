//! HTTP surface: `/api/v1/memory/*` behind key auth and quota, plus `/api/health`.

pub mod error;
pub mod middleware;
pub mod routes;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::keys::KeyStore;
use crate::auth::rate_limit::QuotaFailurePolicy;
use crate::config::TierLimits;
use crate::memory::service::MemoryService;

pub use error::ApiError;
pub use middleware::Caller;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub memory: MemoryService,
    pub keys: Arc<dyn KeyStore>,
    pub tiers: TierLimits,
    pub quota_failure: QuotaFailurePolicy,
}

impl AppState {
    pub fn new(memory: MemoryService, keys: Arc<dyn KeyStore>) -> Self {
        Self {
            memory,
            keys,
            tiers: TierLimits::default(),
            quota_failure: QuotaFailurePolicy::default(),
        }
    }

    pub fn with_tiers(mut self, tiers: TierLimits) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_quota_failure(mut self, policy: QuotaFailurePolicy) -> Self {
        self.quota_failure = policy;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // route_layer: the last one added runs first, so authentication precedes the quota.
    let memory = Router::new()
        .route("/recall", post(routes::recall))
        .route("/store", post(routes::store))
        .route("/consolidate", post(routes::consolidate))
        .route("/stats", get(routes::stats))
        .route_layer(from_fn_with_state(state.clone(), middleware::enforce_quota))
        .route_layer(from_fn_with_state(state.clone(), middleware::authenticate));

    Router::new()
        .nest("/api/v1/memory", memory)
        .route("/api/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
