use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use queryjob_infra::{InMemoryJobQueue, JobQueue, JobSource, QueueError};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(queue: Arc<dyn JobQueue>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = queryjob_api::app::build_app(queue);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct DownQueue;

#[async_trait]
impl JobQueue for DownQueue {
    async fn publish(&self, _body: &str) -> Result<String, QueueError> {
        Err(QueueError::Connection("connection refused".to_string()))
    }
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn(Arc::new(InMemoryJobQueue::new())).await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn submitted_body_is_enqueued_verbatim() {
    let queue = InMemoryJobQueue::new();
    let srv = TestServer::spawn(Arc::new(queue.clone())).await;
    let body = r#"{"message": "17|select * from country limit 10"}"#;

    let res = reqwest::Client::new()
        .post(format!("{}/request", srv.base_url))
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let json: serde_json::Value = res.json().await.unwrap();
    let message_id = json["message_id"].as_str().unwrap().to_string();

    let mut consumer = queue.clone();
    let delivered = consumer.receive(10, Duration::ZERO).await.unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, message_id);
    assert_eq!(delivered[0].body.as_deref(), Some(body));
}

#[tokio::test]
async fn malformed_envelopes_are_still_accepted() {
    let queue = InMemoryJobQueue::new();
    let srv = TestServer::spawn(Arc::new(queue.clone())).await;
    let client = reqwest::Client::new();

    for body in ["not json", r#"{"message": "no separator"}"#, ""] {
        let res = client
            .post(format!("{}/request", srv.base_url))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED, "body {body:?}");
    }

    assert_eq!(queue.pending(), 3);
}

#[tokio::test]
async fn queue_failure_is_bad_gateway() {
    let srv = TestServer::spawn(Arc::new(DownQueue)).await;

    let res = reqwest::Client::new()
        .post(format!("{}/request", srv.base_url))
        .body(r#"{"message": "1|select 1"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["error"], "queue_unavailable");
    assert!(json["message"].as_str().unwrap().contains("connection refused"));
}
