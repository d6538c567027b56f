use delayed_jobs::{JobQueue, RedisRestConfig, RedisRestQueue, SchedulerError};
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn queue(server: &MockServer) -> RedisRestQueue {
    RedisRestQueue::new(
        Client::new(),
        RedisRestConfig {
            url: server.uri(),
            token: "redis-token".to_string(),
        },
    )
}

#[tokio::test]
async fn add_sends_zadd_with_score_and_member() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("authorization", "Bearer redis-token"))
        .and(body_json(json!(["ZADD", "delayed-jobs", "1700", "{\"userId\":1}"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
        .expect(1)
        .mount(&server)
        .await;

    queue(&server).add(1700, "{\"userId\":1}").await.unwrap();
}

#[tokio::test]
async fn due_sends_zrangebyscore_with_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!([
            "ZRANGEBYSCORE",
            "delayed-jobs",
            "0",
            "5000",
            "LIMIT",
            "0",
            "50"
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": ["a", "b"]})))
        .expect(1)
        .mount(&server)
        .await;

    let members = queue(&server).due(5000, 50).await.unwrap();
    assert_eq!(members, vec!["a", "b"]);
}

#[tokio::test]
async fn remove_sends_zrem() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!(["ZREM", "delayed-jobs", "a"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
        .expect(1)
        .mount(&server)
        .await;

    queue(&server).remove("a").await.unwrap();
}

#[tokio::test]
async fn error_reply_becomes_queue_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "WRONGTYPE Operation"})),
        )
        .mount(&server)
        .await;

    let err = queue(&server).remove("a").await.unwrap_err();
    assert!(matches!(err, SchedulerError::Queue(message) if message.contains("WRONGTYPE")));
}

#[tokio::test]
async fn unauthorized_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = queue(&server).due(1, 1).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Rejected { status: 401, .. }));
}
