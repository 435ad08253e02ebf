//! Runs many scrapers at once and merges their output.
//!
//! [`interleave`] implements round-robin with early retirement: every round
//! asks each still-active stream for one item concurrently and yields items
//! in arrival order. A stream that ends is retired for good; the merge ends
//! when no stream is left or the cap is reached. Dropping the merged stream
//! drops every lane along with its in-flight work.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, FuturesUnordered};
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;

use crate::article::Article;
use crate::error::AppError;
use crate::filter::{Requires, UrlFilter};
use crate::publisher::{Publisher, SourceKind};
use crate::report::{ScrapeReporter, TracingReporter};
use crate::scrape::{ErrorHandling, ScrapeOptions, Scraper, ScraperConfig, until_first_error};
use crate::session::SessionOverride;
use crate::traits::{FeedReader, Fetcher};

/// Minimum time between the starts of two rounds, asked for once per round.
pub type DelayFn = Arc<dyn Fn() -> Duration + Send + Sync>;

type Lane<T> = BoxStream<'static, T>;

/// Merges `lanes` round by round, yielding at most `limit` items.
pub fn interleave<T>(lanes: Vec<Lane<T>>, limit: Option<usize>, delay: Option<DelayFn>) -> BoxStream<'static, T>
where
    T: Send + 'static,
{
    let state = RoundRobin {
        idle: lanes.into_iter().enumerate().collect(),
        in_flight: FuturesUnordered::new(),
        round_started: None,
        yielded: 0,
        limit,
        delay,
    };
    stream::unfold(state, |mut state| async move {
        let item = state.next().await?;
        Some((item, state))
    })
    .boxed()
}

type Pull<T> = BoxFuture<'static, (usize, Lane<T>, Option<T>)>;

struct RoundRobin<T> {
    /// Lanes that answered in the current round, waiting for the next one.
    idle: Vec<(usize, Lane<T>)>,
    in_flight: FuturesUnordered<Pull<T>>,
    round_started: Option<Instant>,
    yielded: usize,
    limit: Option<usize>,
    delay: Option<DelayFn>,
}

impl<T: Send + 'static> RoundRobin<T> {
    async fn next(&mut self) -> Option<T> {
        loop {
            if self.limit.is_some_and(|limit| self.yielded >= limit) {
                return None;
            }

            if self.in_flight.is_empty() {
                // Every active lane answered or retired: the round is over.
                if self.idle.is_empty() {
                    return None;
                }
                self.start_round().await;
            }

            match self.in_flight.next().await {
                Some((index, lane, Some(item))) => {
                    self.idle.push((index, lane));
                    self.yielded += 1;
                    return Some(item);
                }
                Some((index, _, None)) => {
                    tracing::trace!(lane = index, "Lane exhausted");
                }
                None => {}
            }
        }
    }

    async fn start_round(&mut self) {
        if let (Some(started), Some(delay)) = (self.round_started, &self.delay) {
            tokio::time::sleep_until(started + delay()).await;
        }
        self.round_started = Some(Instant::now());

        self.idle.sort_by_key(|(index, _)| *index);
        for (index, mut lane) in self.idle.drain(..) {
            self.in_flight.push(
                async move {
                    let item = lane.next().await;
                    (index, lane, item)
                }
                .boxed(),
            );
        }
    }
}

/// Parameters of one crawl.
#[derive(Clone, Default)]
pub struct CrawlOptions {
    /// Stop after this many results.
    pub max_articles: Option<usize>,
    /// Drop articles whose validated attributes are incomplete.
    pub only_complete: bool,
    pub error_handling: ErrorHandling,
    /// Source kinds to read. Empty means all.
    pub restrict_sources_to: Vec<SourceKind>,
    pub url_filter: Option<UrlFilter>,
    pub delay: Option<DelayFn>,
}

impl CrawlOptions {
    pub fn with_max_articles(mut self, max: usize) -> Self {
        self.max_articles = Some(max);
        self
    }

    pub fn with_only_complete(mut self, only_complete: bool) -> Self {
        self.only_complete = only_complete;
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    pub fn with_sources(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.restrict_sources_to = kinds.into_iter().collect();
        self
    }

    pub fn with_url_filter(mut self, filter: UrlFilter) -> Self {
        self.url_filter = Some(filter);
        self
    }

    /// Fixed minimum spacing between rounds.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(Arc::new(move || delay));
        self
    }

    pub fn with_delay_fn<D>(mut self, delay: D) -> Self
    where
        D: Fn() -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Arc::new(delay));
        self
    }
}

/// Crawls many publishers with a shared fetcher and feed reader.
pub struct Crawler<F, R> {
    publishers: Vec<Arc<Publisher>>,
    fetcher: F,
    reader: R,
    config: ScraperConfig,
    session: Option<SessionOverride>,
    reporter: Arc<dyn ScrapeReporter>,
}

impl<F, R> Crawler<F, R>
where
    F: Fetcher + 'static,
    R: FeedReader + 'static,
{
    pub fn new(publishers: Vec<Arc<Publisher>>, fetcher: F, reader: R) -> Self {
        Self {
            publishers,
            fetcher,
            reader,
            config: ScraperConfig::default(),
            session: None,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_config(mut self, config: ScraperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_session(mut self, session: SessionOverride) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ScrapeReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn publishers(&self) -> &[Arc<Publisher>] {
        &self.publishers
    }

    /// One merged, lazily evaluated stream over all publishers.
    ///
    /// Publishers without a source of the requested kinds are skipped. The
    /// stream ends after the first `Err`, which only occurs in
    /// [`ErrorHandling::Raise`] mode or on configuration errors.
    pub fn crawl(&self, options: CrawlOptions) -> BoxStream<'static, Result<Article, AppError>> {
        let mut scrape_options = ScrapeOptions::new(options.error_handling);
        scrape_options.url_filter = options.url_filter.clone();
        if options.only_complete {
            scrape_options = scrape_options.with_extraction_filter(Requires::validated());
        }

        let lanes: Vec<_> = self
            .publishers
            .iter()
            .filter(|publisher| {
                let has_sources = publisher.sources_of(&options.restrict_sources_to).next().is_some();
                if !has_sources {
                    tracing::debug!(publisher = %publisher.name, "No matching sources, skipping");
                }
                has_sources
            })
            .map(|publisher| {
                let mut scraper = Scraper::new(Arc::clone(publisher), self.fetcher.clone(), self.reader.clone())
                    .with_config(self.config.clone())
                    .with_source_kinds(options.restrict_sources_to.iter().copied())
                    .with_reporter(Arc::clone(&self.reporter));
                if let Some(session) = &self.session {
                    scraper = scraper.with_session(session.clone());
                }
                scraper.scrape(scrape_options.clone())
            })
            .collect();

        tracing::info!(
            publishers = lanes.len(),
            max_articles = ?options.max_articles,
            error_handling = %options.error_handling,
            "Starting crawl"
        );

        until_first_error(interleave(lanes, options.max_articles, options.delay))
    }
}
