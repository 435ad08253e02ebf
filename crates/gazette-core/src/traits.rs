use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::AppError;

/// A fetched document plus crawl metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub content: String,
    pub requested_url: String,
    /// Final URL after redirects.
    pub responded_url: String,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// A page fetched just now, without redirects.
    pub fn new(url: &str, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            requested_url: url.to_string(),
            responded_url: url.to_string(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_responded_url(mut self, url: impl Into<String>) -> Self {
        self.responded_url = url.into();
        self
    }
}

/// Fetches raw HTML content from a URL.
///
/// Implementations report timeouts, non-success statuses and connection
/// failures as distinct [`AppError`] variants.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage, AppError>> + Send;
}

/// Contents of one sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// A sitemap index listing nested sitemaps.
    Index(Vec<String>),
    /// A plain sitemap listing page URLs.
    UrlSet(Vec<String>),
}

/// Decodes syndication feeds and sitemaps into URL lists.
pub trait FeedReader: Send + Sync + Clone {
    /// Article links of an RSS or Atom feed, in document order.
    fn read_feed(&self, url: &str) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    fn read_sitemap(&self, url: &str) -> impl Future<Output = Result<Sitemap, AppError>> + Send;
}
