//! HTTP gateway (Axum) over the retrieval pipeline.
//!
//! - `POST /search` returns the ranked hits.
//! - `POST /query` returns `{query, hits, answer}`.
//! - `GET /health` is liveness; `GET /ready` checks the vector index.
//!
//! Search responses carry [`crate::cache::CACHE_STATUS_HEADER`].

pub mod error;
pub mod handler;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, GatewayError};
pub use handler::{QueryResponse, SearchRequest, query_handler, search_handler};
pub use state::HandlerState;

use crate::cache::ResultStore;
use crate::embedding::RelevanceScorer;
use crate::vectordb::VectorIndex;

pub fn create_router_with_state<I, R, C>(state: HandlerState<I, R, C>) -> Router
where
    I: VectorIndex + 'static,
    R: RelevanceScorer + 'static,
    C: ResultStore,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static("x-fathom-cache")]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/search", post(search_handler))
        .route("/query", post(query_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub vector_index: &'static str,
    pub reranker: &'static str,
    pub generator: &'static str,
    pub cached_results: usize,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler<I, R, C>(State(state): State<HandlerState<I, R, C>>) -> Response
where
    I: VectorIndex + 'static,
    R: RelevanceScorer + 'static,
    C: ResultStore,
{
    let index_ready = state.pipeline.index().ready().await;

    let components = ComponentStatus {
        http: "ready",
        vector_index: if index_ready { "ready" } else { "pending" },
        reranker: state.pipeline.scorer().mode(),
        generator: state.generator.mode(),
        cached_results: state.pipeline.cache().len(),
    };

    let (status_code, status_msg) = if index_ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "pending")
    };

    (
        status_code,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
