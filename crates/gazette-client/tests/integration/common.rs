use std::time::Duration;

use gazette_client::{ReqwestFetcher, RetryPolicy};
use wiremock::MockServer;

/// Fetcher with fast retries and no robots.txt lookups.
pub fn fetcher() -> ReqwestFetcher {
    ReqwestFetcher::new()
        .unwrap()
        .ignore_robots()
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50)))
}

/// Requests the server received for `path`.
pub async fn hits(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}
