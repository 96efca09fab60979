//! HTTP surface of the native store.

mod filters;
mod handlers;
mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;

pub use filters::{TransactionId, TX_HEADER};

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    /// Deadline for a whole `__ids` stream
    pub ids_timeout: Duration,
}

#[derive(Serialize)]
struct BuildInfo {
    version: &'static str,
}

async fn ping() -> &'static str {
    "pong"
}

async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/__health", get(health::health))
        .route("/__gtg", get(health::good_to_go))
        .route("/__ping", get(ping))
        .route("/__build-info", get(build_info))
        .route("/{collection}/__ids", get(handlers::read_ids))
        .route(
            "/{collection}/{resource}",
            get(handlers::read_content)
                .put(handlers::write_content)
                .patch(handlers::patch_content)
                .delete(handlers::delete_content),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(filters::transaction_id)),
        )
}
