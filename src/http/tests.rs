//! Tests for the HTTP client module

use super::*;
use crate::auth::BearerToken;
use crate::error::Error;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert!(config.user_agent.starts_with("likers-collector/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(60))
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("max_results", "100")
        .query("pagination_token", "abc");

    assert_eq!(config.query.get("max_results"), Some(&"100".to_string()));
    assert_eq!(config.query.get("pagination_token"), Some(&"abc".to_string()));
}

#[tokio::test]
async fn test_get_with_query_and_signer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/42/liking_users"))
        .and(query_param("max_results", "100"))
        .and(header("Authorization", "Bearer tok"))
        .and(header("User-Agent", "test-agent/1.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(REMAINING_HEADER, "74")
                .insert_header(RESET_HEADER, "1700000000")
                .set_body_json(serde_json::json!({"data": [{"id": "a"}]})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .user_agent("test-agent/1.0")
        .build();
    let client = HttpClient::with_config(config)
        .unwrap()
        .with_signer(Arc::new(BearerToken::new("tok").unwrap()));

    let response = client
        .get_with_config(
            &format!("{}/2/tweets/42/liking_users", mock_server.uri()),
            RequestConfig::new().query("max_results", "100"),
        )
        .await
        .unwrap();

    assert!(response.is_success());
    let info = response.rate_limit();
    assert_eq!(info.remaining, 74);
    assert_eq!(info.reset_epoch, Some(1_700_000_000));
    assert!(response.body.contains("\"a\""));
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::new().unwrap();
    let response = client
        .get_with_config(&mock_server.uri(), RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(response.status, 503);
    assert!(!response.is_success());
    assert_eq!(response.body, "try later");
}

#[tokio::test]
async fn test_timeout_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .timeout(Duration::from_millis(50))
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let result = client
        .get_with_config(&mock_server.uri(), RequestConfig::new())
        .await;

    match result {
        Err(Error::Timeout { timeout_ms }) => assert_eq!(timeout_ms, 50),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_http_error() {
    let client = HttpClient::new().unwrap();
    let result = client
        .get_with_config("http://127.0.0.1:9/unreachable", RequestConfig::new())
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_body_excerpt() {
    let response = HttpResponse {
        status: 400,
        headers: reqwest::header::HeaderMap::new(),
        body: "abcdefghij".to_string(),
    };
    assert_eq!(response.body_excerpt(4), "abcd...");
    assert_eq!(response.body_excerpt(20), "abcdefghij");
}
