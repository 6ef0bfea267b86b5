//! Tests for page parsing and the retrying fetcher

use super::*;
use crate::http::{now_epoch, HttpClient, REMAINING_HEADER, RESET_HEADER};
use crate::types::CollectionTarget;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIKERS_PATH: &str = "/2/tweets/42/liking_users";

fn target() -> CollectionTarget {
    CollectionTarget::new("42").unwrap()
}

/// Millisecond-scale waits so retry paths run quickly
fn fast_policy() -> FetchPolicy {
    FetchPolicy::default()
        .with_max_attempts(3)
        .with_rate_limit_waits(Duration::ZERO, Duration::ZERO)
        .with_low_remaining_pause(Duration::ZERO, Duration::from_millis(5))
        .with_backoff(
            Duration::from_millis(5),
            Duration::from_millis(20),
            Duration::ZERO,
        )
}

fn fetcher_for(server: &MockServer, policy: FetchPolicy) -> (PageFetcher, CancellationToken) {
    let cancel = CancellationToken::new();
    let endpoint = ListingEndpoint::new(&format!("{}/2", server.uri())).unwrap();
    let fetcher = PageFetcher::new(HttpClient::new().unwrap(), endpoint, cancel.clone())
        .with_policy(policy);
    (fetcher, cancel)
}

fn page_body(ids: &[&str], next: Option<&str>) -> serde_json::Value {
    let data: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": id, "username": format!("user_{id}")}))
        .collect();
    match next {
        Some(token) => json!({"data": data, "meta": {"next_token": token}}),
        None => json!({"data": data, "meta": {}}),
    }
}

#[test]
fn test_endpoint_url_and_query() {
    let endpoint = ListingEndpoint::new("https://api.twitter.com/2/").unwrap();
    let url = endpoint.url_for(&target()).unwrap();
    assert_eq!(
        url.as_str(),
        "https://api.twitter.com/2/tweets/42/liking_users"
    );

    let first = endpoint.request_for(None);
    assert_eq!(first.query.get("max_results"), Some(&"100".to_string()));
    assert_eq!(
        first.query.get("user.fields"),
        Some(&DEFAULT_USER_FIELDS.to_string())
    );
    assert!(!first.query.contains_key("pagination_token"));

    let next = endpoint.with_page_size(50).request_for(Some("X"));
    assert_eq!(next.query.get("pagination_token"), Some(&"X".to_string()));
    assert_eq!(next.query.get("max_results"), Some(&"50".to_string()));
}

#[test]
fn test_parse_page() {
    let body = r#"{
        "data": [{"id": "a", "username": "alice"}, {"name": "no id"}, {"id": "b"}],
        "meta": {"next_token": "X", "result_count": 3}
    }"#;
    let page = parse_page(body, "https://x.com/").unwrap();
    assert_eq!(page.raw_count, 3);
    let ids: Vec<_> = page.records.iter().map(|r| r.record_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(page.next_cursor.as_deref(), Some("X"));
    assert!(!page.is_last());
}

#[test]
fn test_parse_page_without_data_or_meta() {
    let page = parse_page(r#"{"meta": {"result_count": 0}}"#, "https://x.com/").unwrap();
    assert!(page.records.is_empty());
    assert!(page.is_last());

    let page = parse_page(r#"{"data": [], "meta": {"next_token": ""}}"#, "https://x.com/").unwrap();
    assert!(page.is_last());
}

#[test]
fn test_parse_page_rejects_non_object() {
    assert!(parse_page("not json", "https://x.com/").is_err());
    assert!(parse_page("42", "https://x.com/").is_err());
}

#[test]
fn test_backoff_is_exponential_and_capped() {
    let policy = FetchPolicy::default();
    assert_eq!(policy.backoff_base(0), Duration::from_secs(1));
    assert_eq!(policy.backoff_base(3), Duration::from_secs(8));
    assert_eq!(policy.backoff_base(9), Duration::from_secs(300));
    assert_eq!(policy.backoff_base(40), Duration::from_secs(300));

    for attempt in 0..7 {
        let delay = policy.backoff_delay(attempt);
        let base = policy.backoff_base(attempt);
        assert!(delay >= base);
        assert!(delay < base + Duration::from_millis(1200));
    }
}

#[test]
fn test_rate_limited_wait_has_floor() {
    let policy = FetchPolicy::default();
    assert_eq!(policy.rate_limited_wait(0), Duration::from_secs(5));
    assert_eq!(policy.rate_limited_wait(10), Duration::from_secs(12));
}

#[tokio::test]
async fn test_first_page_has_no_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .and(query_param_is_missing("pagination_token"))
        .and(query_param("max_results", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a", "b"], Some("X"))))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let result = fetcher.fetch_page(&target(), None).await.unwrap();

    let page = result.into_page().expect("page");
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.next_cursor.as_deref(), Some("X"));
}

#[tokio::test]
async fn test_cursor_sent_as_pagination_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .and(query_param("pagination_token", "X"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["c"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let page = fetcher
        .fetch_page(&target(), Some("X"))
        .await
        .unwrap()
        .into_page()
        .expect("page");
    assert!(page.is_last());
    assert_eq!(page.records[0].record_id, "c");
}

#[tokio::test]
async fn test_server_error_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert!(matches!(result, PageResult::Page(_)));
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert_eq!(
        result,
        PageResult::Failed(FetchFailure::RetriesExhausted { attempts: 3 })
    );
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such tweet"))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert_eq!(
        result,
        PageResult::Failed(FetchFailure::Rejected {
            status: 404,
            body: "no such tweet".to_string(),
        })
    );
}

#[tokio::test]
async fn test_malformed_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert!(matches!(
        result,
        PageResult::Failed(FetchFailure::MalformedPage { .. })
    ));
}

#[tokio::test]
async fn test_rate_limited_without_reset_backs_off() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert!(matches!(result, PageResult::Page(_)));
}

#[tokio::test]
async fn test_rate_limited_waits_for_reset() {
    let server = MockServer::start().await;
    let reset = now_epoch() + 1;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header(REMAINING_HEADER, "0")
                .insert_header(RESET_HEADER, reset.to_string().as_str()),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let policy =
        fast_policy().with_rate_limit_waits(Duration::from_secs(1), Duration::from_secs(1));
    let (fetcher, _cancel) = fetcher_for(&server, policy);
    let result = fetcher.fetch_page(&target(), None).await.unwrap();

    assert!(matches!(result, PageResult::Page(_)));
    assert!(now_epoch() >= reset + 1);
}

#[tokio::test]
async fn test_stop_during_rate_limit_wait() {
    let server = MockServer::start().await;
    let reset = now_epoch() + 600;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header(REMAINING_HEADER, "0")
                .insert_header(RESET_HEADER, reset.to_string().as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, cancel) = fetcher_for(&server, FetchPolicy::default());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let start = Instant::now();
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert_eq!(result, PageResult::Stopped);
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_stop_before_request_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a"], None)))
        .expect(0)
        .mount(&server)
        .await;

    let (fetcher, cancel) = fetcher_for(&server, fast_policy());
    cancel.cancel();
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert_eq!(result, PageResult::Stopped);
}

#[tokio::test]
async fn test_low_remaining_still_returns_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(REMAINING_HEADER, "3")
                .insert_header(RESET_HEADER, (now_epoch() + 900).to_string().as_str())
                .set_body_json(page_body(&["a"], Some("Y"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _cancel) = fetcher_for(&server, fast_policy());
    let page = fetcher
        .fetch_page(&target(), None)
        .await
        .unwrap()
        .into_page()
        .expect("page");
    assert_eq!(page.next_cursor.as_deref(), Some("Y"));
}

#[tokio::test]
async fn test_exhausted_window_waits_for_reset() {
    let server = MockServer::start().await;
    let reset = now_epoch() + 1;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(REMAINING_HEADER, "0")
                .insert_header(RESET_HEADER, reset.to_string().as_str())
                .set_body_json(page_body(&["a"], Some("Y"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let policy = fast_policy().with_rate_limit_waits(Duration::from_secs(1), Duration::ZERO);
    let (fetcher, _cancel) = fetcher_for(&server, policy);
    let page = fetcher
        .fetch_page(&target(), None)
        .await
        .unwrap()
        .into_page()
        .expect("page");

    assert_eq!(page.next_cursor.as_deref(), Some("Y"));
    assert!(now_epoch() >= reset + 1);
}

#[tokio::test]
async fn test_stop_during_reset_wait_keeps_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(REMAINING_HEADER, "1")
                .insert_header(RESET_HEADER, (now_epoch() + 600).to_string().as_str())
                .set_body_json(page_body(&["a", "b"], Some("Y"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, cancel) = fetcher_for(&server, FetchPolicy::default());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let start = Instant::now();
    let page = fetcher
        .fetch_page(&target(), None)
        .await
        .unwrap()
        .into_page()
        .expect("page");
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.next_cursor.as_deref(), Some("Y"));
}

#[tokio::test]
async fn test_missing_rate_limit_headers_pause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&["a"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let policy = fast_policy()
        .with_low_remaining_pause(Duration::from_millis(300), Duration::from_millis(400));
    let (fetcher, _cancel) = fetcher_for(&server, policy);

    let start = Instant::now();
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert!(matches!(result, PageResult::Page(_)));
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_plenty_remaining_does_not_pause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIKERS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(REMAINING_HEADER, "50")
                .insert_header(RESET_HEADER, (now_epoch() + 900).to_string().as_str())
                .set_body_json(page_body(&["a"], Some("Y"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let policy =
        fast_policy().with_low_remaining_pause(Duration::from_secs(5), Duration::from_secs(6));
    let (fetcher, _cancel) = fetcher_for(&server, policy);

    let start = Instant::now();
    let result = fetcher.fetch_page(&target(), None).await.unwrap();
    assert!(matches!(result, PageResult::Page(_)));
    assert!(start.elapsed() < Duration::from_secs(2));
}
