//! Shared test helpers for the AWS adapter integration tests
//!
//! Each helper starts a wiremock server and builds an [`AwsSession`] whose
//! endpoint override points at it, with static credentials and a single
//! attempt per call so error cases fail fast.

use aws_credential_types::Credentials;
use s3mirror_aws::session::AwsSession;
use s3mirror_core::config::{AwsConfig, QueueConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const QUEUE_NAME: &str = "s3-events";

/// Content type of the SQS JSON protocol
pub const SQS_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Starts a mock server and returns a session pointing at it
pub async fn setup_session() -> (MockServer, AwsSession) {
    let server = MockServer::start().await;
    let session = session_for(&server.uri()).await;
    (server, session)
}

/// Session pointing at an arbitrary endpoint
pub async fn session_for(endpoint_url: &str) -> AwsSession {
    let config = AwsConfig {
        region: "us-east-1".to_string(),
        endpoint_url: Some(endpoint_url.to_string()),
        max_attempts: 1,
    };
    let credentials = Credentials::new("AKIDTESTKEY", "test-secret", None, None, "test");
    AwsSession::with_credentials(&config, credentials).await
}

/// Answers one HTTP request with `body` and returns its request target
///
/// wiremock parses request URLs with `url::Url`, which drops `.` and `..`
/// segments, so keys containing them are checked against the raw request
/// line instead.
pub async fn serve_once(body: &'static [u8]) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before request head");
            head.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();
        stream.shutdown().await.unwrap();

        let head = String::from_utf8_lossy(&head);
        let request_line = head.lines().next().unwrap_or_default();
        request_line
            .split(' ')
            .nth(1)
            .unwrap_or_default()
            .to_string()
    });

    (endpoint, handle)
}

pub fn queue_config() -> QueueConfig {
    QueueConfig {
        name: QUEUE_NAME.to_string(),
        batch_size: 10,
        wait_time_seconds: 0,
        visibility_timeout: Some(30),
    }
}

pub fn queue_url(server: &MockServer) -> String {
    format!("{}/000000000000/{QUEUE_NAME}", server.uri())
}

/// Mounts a JSON-protocol SQS operation
pub async fn mount_sqs(server: &MockServer, operation: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(header("x-amz-target", format!("AmazonSQS.{operation}").as_str()))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", SQS_CONTENT_TYPE)
                .set_body_string(body.to_string()),
        )
        .mount(server)
        .await;
}

/// Mounts a successful GetQueueUrl response
pub async fn mount_queue_url(server: &MockServer) {
    let url = queue_url(server);
    mount_sqs(server, "GetQueueUrl", 200, serde_json::json!({ "QueueUrl": url })).await;
}

/// Mounts `GET /{bucket}/{key}` returning `body`
pub async fn mount_object(server: &MockServer, bucket: &str, key: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{bucket}/{key}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"d41d8cd98f00b204e9800998ecf8427e\"")
                .insert_header("Last-Modified", "Fri, 01 Mar 2024 12:30:00 GMT")
                .insert_header("Content-Type", "application/octet-stream")
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

/// Mounts `GET /{bucket}/{key}` returning an S3 NoSuchKey error
pub async fn mount_missing_object(server: &MockServer, bucket: &str, key: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{bucket}/{key}")))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                     <Error><Code>NoSuchKey</Code>\
                     <Message>The specified key does not exist.</Message></Error>",
                ),
        )
        .mount(server)
        .await;
}
