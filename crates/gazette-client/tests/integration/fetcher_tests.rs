use std::time::Duration;

use gazette_client::{ReqwestFetcher, RetryPolicy};
use gazette_core::error::AppError;
use gazette_core::session::{self, SessionOverride};
use gazette_core::traits::Fetcher;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::{fetcher, hits};

#[tokio::test]
async fn fetch_returns_body_and_redirect_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Moved</h1>"))
        .mount(&server)
        .await;

    let url = format!("{}/old", server.uri());
    let page = fetcher().fetch(&url).await.unwrap();

    assert_eq!(page.content, "<h1>Moved</h1>");
    assert_eq!(page.requested_url, url);
    assert_eq!(page.responded_url, format!("{}/new", server.uri()));
}

#[tokio::test]
async fn not_found_is_reported_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::HttpStatus { status: 404, .. }));
    assert_eq!(hits(&server, "/missing").await, 1);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let page = fetcher().fetch(&format!("{}/flaky", server.uri())).await.unwrap();

    assert_eq!(page.content, "finally");
    assert_eq!(hits(&server, "/flaky").await, 3);
}

#[tokio::test]
async fn retries_give_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = fetcher().fetch(&format!("{}/down", server.uri())).await.unwrap_err();

    assert!(matches!(err, AppError::HttpStatus { status: 500, .. }));
    assert_eq!(hits(&server, "/down").await, 3);
}

#[tokio::test]
async fn session_timeout_applies_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = fetcher().with_retry(RetryPolicy::none());
    let url = format!("{}/slow", server.uri());
    let err = session::scoped(
        SessionOverride::timeout(Duration::from_millis(200)),
        fetcher.fetch(&url),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn session_user_agent_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header("user-agent", "tester/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello tester"))
        .mount(&server)
        .await;

    let fetcher = fetcher();
    let url = format!("{}/ua", server.uri());
    let page = session::scoped(SessionOverride::user_agent("tester/1.0"), fetcher.fetch(&url))
        .await
        .unwrap();

    assert_eq!(page.content, "hello tester");
}

#[tokio::test]
async fn robots_txt_is_honored_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("open"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new().unwrap().with_retry(RetryPolicy::none());

    let err = fetcher
        .fetch(&format!("{}/private/1", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RobotsDisallowed(_)));

    let page = fetcher.fetch(&format!("{}/public/1", server.uri())).await.unwrap();
    assert_eq!(page.content, "open");

    assert_eq!(hits(&server, "/private/1").await, 0);
    assert_eq!(hits(&server, "/robots.txt").await, 1);
}

#[tokio::test]
async fn missing_robots_txt_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new().unwrap();
    let page = fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
    assert_eq!(page.content, "ok");
}

#[tokio::test]
async fn failed_robots_txt_lookup_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new().unwrap().with_retry(RetryPolicy::none());
    let url = format!("{}/private/1", server.uri());

    // robots.txt is down: the request goes through.
    let page = fetcher.fetch(&url).await.unwrap();
    assert_eq!(page.content, "secret");

    // Next lookup sees the real rules.
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, AppError::RobotsDisallowed(_)));
    assert_eq!(hits(&server, "/robots.txt").await, 2);
    assert_eq!(hits(&server, "/private/1").await, 1);
}

#[tokio::test]
async fn missing_robots_txt_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new().unwrap();
    fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
    fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
    assert_eq!(hits(&server, "/robots.txt").await, 1);
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let fetcher = fetcher().with_retry(RetryPolicy::none());
    let err = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
    assert!(matches!(err, AppError::NetworkError(_)), "got {err:?}");
}
