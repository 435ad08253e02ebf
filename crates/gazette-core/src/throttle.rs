//! Per-host request spacing.
//!
//! [`ThrottledFetcher`] wraps any [`Fetcher`] and keeps requests to the same
//! origin (scheme, host, port) at least `delay` apart, plus optional random
//! jitter. Each request reserves the next free slot for its origin before
//! sleeping, so concurrent callers queue up instead of firing together.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use gazette_core::throttle::{ThrottleConfig, ThrottledFetcher};
//! # use gazette_core::traits::{FetchedPage, Fetcher};
//! # #[derive(Clone)] struct Http;
//! # impl Fetcher for Http {
//! #     async fn fetch(&self, url: &str) -> Result<FetchedPage, gazette_core::AppError> { todo!() }
//! # }
//! let config = ThrottleConfig::new(Duration::from_millis(500)).with_jitter(Duration::from_millis(250));
//! let fetcher = ThrottledFetcher::new(Http, config);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::error::AppError;
use crate::traits::{FetchedPage, Fetcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum spacing between two requests to one origin.
    pub delay: Duration,
    /// Upper bound of the random extra wait added per request.
    pub jitter: Duration,
}

impl ThrottleConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn spacing(&self) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(xorshift() % jitter_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
        }
    }
}

#[derive(Clone)]
pub struct ThrottledFetcher<F> {
    inner: F,
    config: ThrottleConfig,
    /// Earliest start of the next request, per origin.
    next_slot: Arc<Mutex<HashMap<String, Instant>>>,
}

impl<F: Fetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, config: ThrottleConfig) -> Self {
        Self {
            inner,
            config,
            next_slot: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn origin(url: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(format!("{}://{host}:{port}", url.scheme()))
    }

    /// Claims a start time for `origin` and returns it.
    fn reserve(&self, origin: &str) -> Instant {
        let now = Instant::now();
        let mut slots = match self.next_slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let start = slots.get(origin).map_or(now, |&slot| slot.max(now));
        slots.insert(origin.to_string(), start + self.config.spacing());
        start
    }
}

impl<F: Fetcher> Fetcher for ThrottledFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        if let Some(origin) = Self::origin(url) {
            let start = self.reserve(&origin);
            let wait = start.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                tracing::debug!(%origin, wait_ms = %wait.as_millis(), "Throttling request");
                tokio::time::sleep_until(start).await;
            }
        }
        self.inner.fetch(url).await
    }
}

/// Cheap pseudo-random number from the clock; only used for jitter.
fn xorshift() -> u64 {
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15)
        | 1;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}
