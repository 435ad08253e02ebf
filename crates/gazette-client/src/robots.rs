//! robots.txt lookups with a per-origin cache.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use robotstxt::DefaultMatcher;
use url::Url;

const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_CAPACITY: u64 = 1_000;

/// Caches robots.txt bodies by origin. `None` means no usable robots.txt,
/// which allows everything.
#[derive(Clone)]
pub struct RobotsCache {
    bodies: Cache<String, Option<Arc<str>>>,
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl RobotsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            bodies: Cache::builder()
                .max_capacity(DEFAULT_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Whether `user_agent` may fetch `url`. URLs that cannot be parsed are
    /// left to the HTTP layer to reject.
    ///
    /// Only definite answers are cached: a body, or a 4xx meaning there are
    /// no rules. Server errors and network failures allow this request and
    /// are retried on the next lookup.
    pub async fn allowed(&self, client: &Client, url: &str, user_agent: &str, timeout: Duration) -> bool {
        let Some(robots_url) = robots_url(url) else {
            return true;
        };
        let body = self
            .bodies
            .try_get_with(robots_url.clone(), download(client, robots_url.clone(), user_agent, timeout))
            .await;
        match body {
            Ok(Some(body)) => is_allowed(&body, user_agent, url),
            Ok(None) => true,
            Err(error) => {
                tracing::debug!(url = %robots_url, %error, "robots.txt unavailable, allowing this request");
                true
            }
        }
    }
}

fn robots_url(url: &str) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_path("/robots.txt");
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

async fn download(
    client: &Client,
    robots_url: String,
    user_agent: &str,
    timeout: Duration,
) -> Result<Option<Arc<str>>, String> {
    let response = client
        .get(&robots_url)
        .header(USER_AGENT, user_agent)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if status.is_server_error() {
        return Err(format!("status {}", status.as_u16()));
    }
    if !status.is_success() {
        tracing::debug!(url = %robots_url, status = status.as_u16(), "No robots.txt, allowing all");
        return Ok(None);
    }
    let body = response.text().await.map_err(|e| e.to_string())?;
    Ok(Some(Arc::from(body)))
}

/// Evaluates a robots.txt body for one agent and URL.
pub fn is_allowed(robots_body: &str, user_agent: &str, url: &str) -> bool {
    // Matching uses the product token only, e.g. "gazette" for "gazette/0.1".
    let agent = user_agent.split(['/', ' ']).next().unwrap_or(user_agent);
    DefaultMatcher::default().one_agent_allowed_by_robots(robots_body, agent, url)
}
