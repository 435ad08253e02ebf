//! Test utilities: in-memory fetcher, feed reader and reporter.
//!
//! All mocks share their state through `Arc<Mutex<_>>`, so clones handed to
//! a scraper still record into the instance the test inspects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::report::{ScrapeEvent, ScrapeReporter};
use crate::session;
use crate::traits::{FeedReader, FetchedPage, Fetcher, Sitemap};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Response {
    Page(String),
    Status(u16),
}

/// Serves canned pages by URL. Unknown URLs answer 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Response>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    fetched: Arc<Mutex<Vec<String>>>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.set(url, Response::Page(html.to_string()));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.set(url, Response::Status(status));
        self
    }

    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
        self
    }

    fn set(&self, url: &str, response: Response) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    /// URLs fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// User agent of the session active during each fetch.
    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.user_agents
            .lock()
            .unwrap()
            .push(session::current().user_agent);

        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some(Response::Page(html)) => Ok(FetchedPage::new(url, html)),
            Some(Response::Status(status)) => Err(AppError::HttpStatus {
                status,
                url: url.to_string(),
            }),
            None => Err(AppError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MockFeedReader
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Listing {
    Feed(Vec<String>),
    Sitemap(Sitemap),
    Failure(String),
}

/// Serves canned feeds and sitemaps by URL and records every read.
#[derive(Clone, Default)]
pub struct MockFeedReader {
    listings: Arc<Mutex<HashMap<String, Listing>>>,
    reads: Arc<Mutex<Vec<String>>>,
}

fn owned(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

impl MockFeedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(self, url: &str, urls: &[&str]) -> Self {
        self.set(url, Listing::Feed(owned(urls)))
    }

    pub fn with_urlset(self, url: &str, urls: &[&str]) -> Self {
        self.set(url, Listing::Sitemap(Sitemap::UrlSet(owned(urls))))
    }

    pub fn with_index(self, url: &str, sitemaps: &[&str]) -> Self {
        self.set(url, Listing::Sitemap(Sitemap::Index(owned(sitemaps))))
    }

    pub fn with_failure(self, url: &str, message: &str) -> Self {
        self.set(url, Listing::Failure(message.to_string()))
    }

    fn set(self, url: &str, listing: Listing) -> Self {
        self.listings
            .lock()
            .unwrap()
            .insert(url.to_string(), listing);
        self
    }

    /// URLs read so far, in call order.
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    fn lookup(&self, url: &str) -> Result<Listing, AppError> {
        self.reads.lock().unwrap().push(url.to_string());
        match self.listings.lock().unwrap().get(url).cloned() {
            Some(Listing::Failure(message)) => Err(AppError::FeedError(message)),
            Some(listing) => Ok(listing),
            None => Err(AppError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

impl FeedReader for MockFeedReader {
    async fn read_feed(&self, url: &str) -> Result<Vec<String>, AppError> {
        match self.lookup(url)? {
            Listing::Feed(urls) => Ok(urls),
            _ => Err(AppError::FeedError(format!("{url} is not a feed"))),
        }
    }

    async fn read_sitemap(&self, url: &str) -> Result<Sitemap, AppError> {
        match self.lookup(url)? {
            Listing::Sitemap(sitemap) => Ok(sitemap),
            _ => Err(AppError::FeedError(format!("{url} is not a sitemap"))),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records event labels.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ScrapeReporter for RecordingReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        self.events.lock().unwrap().push(event.label().to_string());
    }
}
