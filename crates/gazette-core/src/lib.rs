pub mod article;
pub mod config;
pub mod context;
pub mod crawl;
pub mod engine;
pub mod error;
pub mod filter;
pub mod publisher;
pub mod record;
pub mod report;
pub mod rule_set;
pub mod rules;
pub mod scrape;
pub mod session;
pub mod source;
pub mod step;
pub mod throttle;
pub mod traits;
pub mod util;

#[cfg(test)]
mod testutil;

pub use article::{Article, ArticleBody, ArticleSource, Image};
pub use config::{PublisherConfig, RegistryConfig};
pub use context::DocumentContext;
pub use crawl::{CrawlOptions, Crawler};
pub use engine::{Extraction, extract};
pub use error::{AppError, StepError};
pub use filter::{ExtractionFilter, Requires, UrlFilter};
pub use publisher::{Publisher, Registry, SourceKind, SourceSpec};
pub use record::{AttributeResult, ExtractionRecord};
pub use report::{ScrapeEvent, ScrapeReporter, TracingReporter};
pub use rule_set::{RuleSet, RuleSetVersion, VersionedRuleSet};
pub use rules::RuleSetCatalog;
pub use scrape::{ErrorHandling, ScrapeOptions, Scraper, ScraperConfig};
pub use session::{SessionConfig, SessionOverride};
pub use source::SourceReader;
pub use step::{Role, Step};
pub use throttle::{ThrottleConfig, ThrottledFetcher};
pub use traits::{FeedReader, FetchedPage, Fetcher, Sitemap};
