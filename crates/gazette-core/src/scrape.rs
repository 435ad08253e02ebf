use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::StreamExt;
use futures::future;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};

use crate::article::{Article, ArticleSource};
use crate::engine::{self, Extraction};
use crate::error::AppError;
use crate::filter::{ExtractionFilter, UrlFilter};
use crate::publisher::{Publisher, SourceKind};
use crate::report::{ScrapeEvent, ScrapeReporter, TracingReporter};
use crate::rule_set::VersionedRuleSet;
use crate::session::{self, SessionOverride};
use crate::source::SourceReader;
use crate::traits::{FeedReader, FetchedPage, Fetcher};

/// What to do with a document-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandling {
    /// Yield the error (annotated with the URL) and stop.
    Raise,
    /// Yield a failure article and continue.
    Catch,
    /// Log and continue.
    #[default]
    Suppress,
}

impl ErrorHandling {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorHandling::Raise => "raise",
            ErrorHandling::Catch => "catch",
            ErrorHandling::Suppress => "suppress",
        }
    }
}

impl fmt::Display for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raise" => Ok(ErrorHandling::Raise),
            "catch" => Ok(ErrorHandling::Catch),
            "suppress" => Ok(ErrorHandling::Suppress),
            _ => Err(format!("Unknown error handling mode: {}", s)),
        }
    }
}

/// Fetch settings for one scraper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Documents fetched at the same time.
    pub fetch_concurrency: usize,
    /// Yield documents in source order (`true`) or as soon as they are ready.
    pub preserve_order: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 1,
            preserve_order: true,
        }
    }
}

impl ScraperConfig {
    pub fn with_fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }

    pub fn with_preserve_order(mut self, preserve: bool) -> Self {
        self.preserve_order = preserve;
        self
    }
}

/// Per-call scrape options.
#[derive(Clone, Default)]
pub struct ScrapeOptions {
    pub error_handling: ErrorHandling,
    pub extraction_filter: Option<Arc<dyn ExtractionFilter>>,
    pub url_filter: Option<UrlFilter>,
}

impl ScrapeOptions {
    pub fn new(error_handling: ErrorHandling) -> Self {
        Self {
            error_handling,
            ..Self::default()
        }
    }

    pub fn with_extraction_filter(mut self, filter: impl ExtractionFilter + 'static) -> Self {
        self.extraction_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_url_filter(mut self, filter: UrlFilter) -> Self {
        self.url_filter = Some(filter);
        self
    }
}

/// Selects the rule set version for the page's crawl date and runs it.
pub fn extract_page(rules: &VersionedRuleSet, page: &FetchedPage) -> Result<Extraction, AppError> {
    let rules = rules.select(Some(page.fetched_at.date_naive()));
    engine::extract(rules, &page.responded_url, &page.content)
}

/// Binds one publisher's sources to a fetcher and its rule sets.
///
/// Generic over the fetcher and feed reader so tests run without HTTP.
pub struct Scraper<F, R> {
    publisher: Arc<Publisher>,
    fetcher: F,
    reader: R,
    source_kinds: Vec<SourceKind>,
    config: ScraperConfig,
    session: Option<SessionOverride>,
    reporter: Arc<dyn ScrapeReporter>,
}

impl<F, R> Scraper<F, R>
where
    F: Fetcher + 'static,
    R: FeedReader + 'static,
{
    pub fn new(publisher: Arc<Publisher>, fetcher: F, reader: R) -> Self {
        Self {
            publisher,
            fetcher,
            reader,
            source_kinds: Vec::new(),
            config: ScraperConfig::default(),
            session: None,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_config(mut self, config: ScraperConfig) -> Self {
        self.config = config;
        self
    }

    /// Only reads sources of these kinds. Empty means all.
    pub fn with_source_kinds(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.source_kinds = kinds.into_iter().collect();
        self
    }

    /// Session settings applied to every fetch of this scraper.
    pub fn with_session(mut self, session: SessionOverride) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ScrapeReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Lazily scrapes the publisher's articles.
    ///
    /// Each fetched document is run through the rule set version matching
    /// its crawl date. Filtered documents and records rejected by the
    /// extraction filter are skipped. Document-level errors follow
    /// `options.error_handling`; configuration errors end the stream in
    /// every mode. The stream ends right after the first `Err` it yields.
    pub fn scrape(&self, options: ScrapeOptions) -> BoxStream<'static, Result<Article, AppError>> {
        let mut sources = SourceReader::new(self.reader.clone(), &self.publisher, &self.source_kinds)
            .with_reporter(Arc::clone(&self.reporter));
        if let Some(filter) = options.url_filter.clone() {
            sources = sources.with_url_filter(filter);
        }

        let fetcher = self.fetcher.clone();
        let session = self.session.clone();
        let fetches = sources.urls().map(move |url| {
            let fetcher = fetcher.clone();
            let session = session.clone();
            async move {
                let result = match session {
                    Some(session) => session::scoped(session, fetcher.fetch(&url)).await,
                    None => fetcher.fetch(&url).await,
                };
                (url, result)
            }
        });

        let concurrency = self.config.fetch_concurrency.max(1);
        let fetched: BoxStream<'static, (String, Result<FetchedPage, AppError>)> =
            if self.config.preserve_order {
                fetches.buffered(concurrency).boxed()
            } else {
                fetches.buffer_unordered(concurrency).boxed()
            };

        let pipeline = Pipeline {
            publisher: Arc::clone(&self.publisher),
            reporter: Arc::clone(&self.reporter),
            options,
        };

        until_first_error(
            fetched
                .filter_map(move |(url, result)| future::ready(pipeline.process(url, result)))
                .boxed(),
        )
    }
}

/// Passes items through up to and including the first `Err`, then drops the
/// inner stream without polling it again.
pub(crate) fn until_first_error<T>(
    inner: BoxStream<'static, Result<T, AppError>>,
) -> BoxStream<'static, Result<T, AppError>>
where
    T: Send + 'static,
{
    stream::unfold(Some(inner), |inner| async move {
        let mut inner = inner?;
        let item = inner.next().await?;
        let rest = if item.is_ok() { Some(inner) } else { None };
        Some((item, rest))
    })
    .boxed()
}

struct Pipeline {
    publisher: Arc<Publisher>,
    reporter: Arc<dyn ScrapeReporter>,
    options: ScrapeOptions,
}

impl Pipeline {
    fn process(&self, url: String, fetched: Result<FetchedPage, AppError>) -> Option<Result<Article, AppError>> {
        let publisher = self.publisher.name.as_str();
        let page = match fetched {
            Ok(page) => page,
            Err(e) => return self.fail(ArticleSource::unfetched(publisher, &url), e),
        };
        let source = ArticleSource::from_page(publisher, &page);

        match extract_page(&self.publisher.rules, &page) {
            Ok(Extraction::Filtered { filter }) => {
                self.reporter.report(ScrapeEvent::Filtered {
                    publisher,
                    url: &url,
                    filter: &filter,
                });
                None
            }
            Ok(Extraction::Extracted(record)) => {
                let rejected = self
                    .options
                    .extraction_filter
                    .as_ref()
                    .is_some_and(|f| f.reject(&record));
                if rejected {
                    self.reporter.report(ScrapeEvent::Incomplete {
                        publisher,
                        url: &url,
                    });
                    return None;
                }
                self.reporter.report(ScrapeEvent::ArticleScraped {
                    publisher,
                    url: &url,
                });
                Some(Ok(Article::new(source, record)))
            }
            Err(e) => self.fail(source, e),
        }
    }

    fn fail(&self, source: ArticleSource, error: AppError) -> Option<Result<Article, AppError>> {
        let handling = self.options.error_handling;
        self.reporter.report(ScrapeEvent::DocumentFailed {
            publisher: &self.publisher.name,
            url: &source.requested_url,
            error: &error.to_string(),
            handling,
        });

        if error.is_fatal() {
            return Some(Err(error.for_url(source.requested_url)));
        }
        match handling {
            ErrorHandling::Raise => Some(Err(error.for_url(source.requested_url))),
            ErrorHandling::Catch => Some(Ok(Article::failed(source, &error))),
            ErrorHandling::Suppress => None,
        }
    }
}
