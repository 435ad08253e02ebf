use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gazette_core::error::AppError;
use gazette_core::traits::{FeedReader, FetchedPage, Fetcher, Sitemap};

/// Serves pages from a fixed map; anything else is a 404.
#[derive(Clone, Default)]
pub struct StaticFetcher {
    pages: Arc<HashMap<String, String>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl StaticFetcher {
    pub fn new(pages: &[(&str, String)]) -> Self {
        Self {
            pages: Arc::new(pages.iter().map(|(u, html)| (u.to_string(), html.clone())).collect()),
            fetched: Arc::default(),
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(html) => Ok(FetchedPage::new(url, html.clone())),
            None => Err(AppError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// Serves RSS feeds and sitemaps from fixed maps.
#[derive(Clone, Default)]
pub struct StaticFeedReader {
    feeds: Arc<HashMap<String, Vec<String>>>,
    sitemaps: Arc<HashMap<String, Sitemap>>,
}

impl StaticFeedReader {
    pub fn new(feeds: &[(&str, &[&str])], sitemaps: &[(&str, Sitemap)]) -> Self {
        Self {
            feeds: Arc::new(
                feeds
                    .iter()
                    .map(|(feed, urls)| (feed.to_string(), urls.iter().map(|u| u.to_string()).collect()))
                    .collect(),
            ),
            sitemaps: Arc::new(sitemaps.iter().map(|(u, s)| (u.to_string(), s.clone())).collect()),
        }
    }
}

impl FeedReader for StaticFeedReader {
    async fn read_feed(&self, url: &str) -> Result<Vec<String>, AppError> {
        self.feeds
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::FeedError(format!("no feed at {url}")))
    }

    async fn read_sitemap(&self, url: &str) -> Result<Sitemap, AppError> {
        self.sitemaps
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::FeedError(format!("no sitemap at {url}")))
    }
}

/// A news article page carrying OpenGraph tags and JSON-LD.
pub fn article_page(title: &str, author: &str, published: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en-US">
<head>
  <title>{title} | Example News</title>
  <meta property="og:type" content="article">
  <meta property="og:title" content="{title}">
  <meta name="author" content="{author}">
  <meta name="keywords" content="politics, economy">
  <script type="application/ld+json">
    {{"@context": "https://schema.org", "@type": "NewsArticle", "headline": "{title}", "datePublished": "{published}"}}
  </script>
</head>
<body>
  <article>
    <p class="lead">The short version.</p>
    <h2>First part</h2>
    <p>Opening paragraph.</p>
    <p>Second paragraph.</p>
  </article>
</body>
</html>"#
    )
}

/// A page that is not an article.
pub fn video_page(title: &str) -> String {
    format!(
        r#"<html><head><meta property="og:type" content="video.other"><meta property="og:title" content="{title}"></head><body></body></html>"#
    )
}
