//! Test server harness.

use std::net::SocketAddr;
use std::time::Duration;

use fathom::gateway::{HandlerState, create_router_with_state};
use fathom::generate::AnswerGenerator;
use fathom::document::Document;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::fixtures::{MockPipeline, mock_pipeline};

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

pub struct TestServer {
    pub addr: SocketAddr,
    pub pipeline: MockPipeline,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn wait_for_server_ready(addr: SocketAddr) -> Result<(), String> {
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/health");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS);

    while tokio::time::Instant::now() < deadline {
        if let Ok(res) = client.get(&url).send().await
            && res.status().is_success()
        {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(STARTUP_POLL_INTERVAL_MS)).await;
    }
    Err(format!("server at {addr} did not become healthy"))
}

/// Serves a mock-backed router on an ephemeral port.
pub async fn spawn_test_server(docs: Vec<Document>) -> Result<TestServer, String> {
    let pipeline = mock_pipeline(docs);
    let app = create_router_with_state(HandlerState::new(
        pipeline.clone(),
        AnswerGenerator::extractive(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| e.to_string())?;
    let addr = listener.local_addr().map_err(|e| e.to_string())?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    wait_for_server_ready(addr).await?;

    Ok(TestServer {
        addr,
        pipeline,
        _server_handle: handle,
        shutdown_tx: Some(shutdown_tx),
    })
}
