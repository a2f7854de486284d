//! End-to-end HTTP tests.

mod common;

use fathom::cache::CACHE_STATUS_HEADER;
use fathom::document::Hit;
use fathom::gateway::QueryResponse;
use serde_json::json;

use common::fixtures::{MIDI_DRESS_QUERY, apparel_catalogue};
use common::harness::spawn_test_server;

fn cache_status(res: &reqwest::Response) -> String {
    res.headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let server = spawn_test_server(apparel_catalogue())
        .await
        .expect("Server should start");

    let body: serde_json::Value = reqwest::get(format!("{}/health", server.url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint_reports_components() {
    let server = spawn_test_server(apparel_catalogue())
        .await
        .expect("Server should start");

    let res = reqwest::get(format!("{}/ready", server.url())).await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["components"]["vector_index"], "ready");
    assert_eq!(body["components"]["reranker"], "mock");
    assert_eq!(body["components"]["generator"], "extractive");
}

#[tokio::test]
async fn test_search_reports_miss_then_hit() {
    let server = spawn_test_server(apparel_catalogue())
        .await
        .expect("Server should start");
    let client = reqwest::Client::new();
    let payload = json!({ "query": MIDI_DRESS_QUERY, "top_k": 20, "top_m": 3 });

    let first = client
        .post(format!("{}/search", server.url()))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    assert_eq!(cache_status(&first), "MISS");
    let first_hits: Vec<Hit> = first.json().await.unwrap();

    let second = client
        .post(format!("{}/search", server.url()))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(cache_status(&second), "HIT");
    let second_hits: Vec<Hit> = second.json().await.unwrap();

    assert_eq!(first_hits, second_hits);
    assert_eq!(first_hits.len(), 3);
    assert_eq!(first_hits[0].title(), "Summer Cotton Midi Dress");
    assert_eq!(server.pipeline.index().query_count(), 1);
}

#[tokio::test]
async fn test_query_returns_hits_and_answer() {
    let server = spawn_test_server(apparel_catalogue())
        .await
        .expect("Server should start");

    let res = reqwest::Client::new()
        .post(format!("{}/query", server.url()))
        .json(&json!({ "query": "wool scarf", "top_m": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let body: QueryResponse = res.json().await.unwrap();
    assert_eq!(body.query, "wool scarf");
    assert_eq!(body.hits.len(), 1);
    assert!(body.answer.starts_with("Answer (extractive fallback):"));
    assert!(body.answer.contains("Wool Winter Scarf"));
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let server = spawn_test_server(apparel_catalogue())
        .await
        .expect("Server should start");

    let res = reqwest::Client::new()
        .post(format!("{}/search", server.url()))
        .json(&json!({ "query": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_index_failure_maps_to_service_unavailable() {
    let server = spawn_test_server(apparel_catalogue())
        .await
        .expect("Server should start");
    server.pipeline.index().set_failing(true);

    let res = reqwest::Client::new()
        .post(format!("{}/search", server.url()))
        .json(&json!({ "query": "cotton" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}
