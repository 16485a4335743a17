//! Integration tests for the fetcher.
//!
//! These tests drive the real HTTP client against mock servers.

use std::time::Duration;

use mediacrawl_core::fetch::{ClientSettings, FetchError, Fetcher, HttpClient, RetryPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(rounds: u32) -> Fetcher<HttpClient> {
    let client = HttpClient::new(&ClientSettings::default()).expect("client should build");
    Fetcher::new(client, RetryPolicy::new(rounds, Duration::ZERO))
}

#[tokio::test]
async fn test_fetch_falls_back_to_second_host() {
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&broken)
        .await;
    Mock::given(method("GET"))
        .and(path("/browse/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&healthy)
        .await;

    let hosts = vec![format!("{}/", broken.uri()), format!("{}/", healthy.uri())];
    let page = fetcher(3).fetch("browse/2", &hosts).await.unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.body, "<html>ok</html>");
    assert!(page.url.starts_with(&healthy.uri()));
}

#[tokio::test]
async fn test_fetch_gives_up_after_configured_rounds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let url = format!("{}/listing", server.uri());
    let err = fetcher(3).fetch(&url, &[]).await.unwrap_err();

    assert!(matches!(err, FetchError::Exhausted { rounds: 3, .. }), "got {err:?}");
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_fetch_rejects_malformed_host_without_requests() {
    let err = fetcher(3)
        .fetch("browse/1", &["not a url".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::InvalidUrl { .. }));
    assert!(!err.is_retryable());
}
