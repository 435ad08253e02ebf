use crate::scrape::ErrorHandling;

/// Events emitted while reading sources and scraping documents.
#[derive(Debug, Clone)]
pub enum ScrapeEvent<'a> {
    SourceRead {
        publisher: &'a str,
        source: &'a str,
        urls: usize,
    },
    SourceFailed {
        publisher: &'a str,
        source: &'a str,
        error: &'a str,
    },
    UrlSkipped {
        publisher: &'a str,
        url: &'a str,
    },
    Filtered {
        publisher: &'a str,
        url: &'a str,
        filter: &'a str,
    },
    /// The extraction filter rejected the record.
    Incomplete {
        publisher: &'a str,
        url: &'a str,
    },
    DocumentFailed {
        publisher: &'a str,
        url: &'a str,
        error: &'a str,
        handling: ErrorHandling,
    },
    ArticleScraped {
        publisher: &'a str,
        url: &'a str,
    },
}

impl ScrapeEvent<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            ScrapeEvent::SourceRead { .. } => "SourceRead",
            ScrapeEvent::SourceFailed { .. } => "SourceFailed",
            ScrapeEvent::UrlSkipped { .. } => "UrlSkipped",
            ScrapeEvent::Filtered { .. } => "Filtered",
            ScrapeEvent::Incomplete { .. } => "Incomplete",
            ScrapeEvent::DocumentFailed { .. } => "DocumentFailed",
            ScrapeEvent::ArticleScraped { .. } => "ArticleScraped",
        }
    }
}

/// Receives scrape events (decoupled logging).
pub trait ScrapeReporter: Send + Sync {
    fn report(&self, _event: ScrapeEvent<'_>) {}
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ScrapeReporter for TracingReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        match event {
            ScrapeEvent::SourceRead {
                publisher,
                source,
                urls,
            } => {
                tracing::debug!(%publisher, %source, %urls, "Source read");
            }
            ScrapeEvent::SourceFailed {
                publisher,
                source,
                error,
            } => {
                tracing::warn!(%publisher, %source, %error, "Skipping source");
            }
            ScrapeEvent::UrlSkipped { publisher, url } => {
                tracing::trace!(%publisher, %url, "URL filtered out");
            }
            ScrapeEvent::Filtered {
                publisher,
                url,
                filter,
            } => {
                tracing::debug!(%publisher, %url, %filter, "Document filtered out");
            }
            ScrapeEvent::Incomplete { publisher, url } => {
                tracing::debug!(%publisher, %url, "Article rejected by extraction filter");
            }
            ScrapeEvent::DocumentFailed {
                publisher,
                url,
                error,
                handling,
            } => {
                tracing::warn!(%publisher, %url, %error, %handling, "Document failed");
            }
            ScrapeEvent::ArticleScraped { publisher, url } => {
                tracing::info!(%publisher, %url, "Article scraped");
            }
        }
    }
}
