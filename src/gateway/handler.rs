use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cache::{CACHE_STATUS_HEADER, CacheStatus, ResultStore};
use crate::document::{Hit, ResultSet, normalize_text};
use crate::embedding::RelevanceScorer;
use crate::gateway::error::GatewayError;
use crate::gateway::state::HandlerState;
use crate::vectordb::VectorIndex;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub top_m: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub hits: Vec<Hit>,
    pub answer: String,
}

/// Parses the body by hand so every malformed request maps to a 400.
pub(crate) fn parse_request(body: serde_json::Value) -> Result<SearchRequest, GatewayError> {
    let mut request: SearchRequest = serde_json::from_value(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {e}")))?;
    request.query = normalize_text(&request.query);
    Ok(request)
}

async fn run_search<I, R, C>(
    state: &HandlerState<I, R, C>,
    request: &SearchRequest,
) -> Result<(ResultSet, CacheStatus), GatewayError>
where
    I: VectorIndex + 'static,
    R: RelevanceScorer + 'static,
    C: ResultStore,
{
    let (top_k, top_m) = state
        .pipeline
        .config()
        .resolve(request.top_k, request.top_m);

    Ok(state
        .pipeline
        .search_with_status(&request.query, top_k, top_m)
        .await?)
}

fn with_cache_status(status: CacheStatus, body: impl IntoResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(status.as_header_value()),
    );
    (headers, body).into_response()
}

#[instrument(skip(state, body))]
pub async fn search_handler<I, R, C>(
    State(state): State<HandlerState<I, R, C>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError>
where
    I: VectorIndex + 'static,
    R: RelevanceScorer + 'static,
    C: ResultStore,
{
    let request = parse_request(body)?;
    let (results, status) = run_search(&state, &request).await?;

    debug!(hits = results.len(), cache = %status, "Search served");
    Ok(with_cache_status(status, Json(results)))
}

#[instrument(skip(state, body))]
pub async fn query_handler<I, R, C>(
    State(state): State<HandlerState<I, R, C>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, GatewayError>
where
    I: VectorIndex + 'static,
    R: RelevanceScorer + 'static,
    C: ResultStore,
{
    let request = parse_request(body)?;
    let (results, status) = run_search(&state, &request).await?;

    let contexts = results.contexts();
    let answer = state.generator.generate(&request.query, &contexts).await;

    debug!(hits = results.len(), cache = %status, "Query answered");
    Ok(with_cache_status(
        status,
        Json(QueryResponse {
            query: request.query,
            hits: results.into_hits(),
            answer,
        }),
    ))
}
