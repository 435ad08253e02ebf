use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gazette_client::{ReqwestFetcher, XmlFeedReader};
use gazette_core::engine::Extraction;
use gazette_core::rules::{GENERIC, RuleSetCatalog};
use gazette_core::scrape::extract_page;
use gazette_core::session::{self, SessionConfig};
use gazette_core::throttle::{ThrottleConfig, ThrottledFetcher};
use gazette_core::traits::Fetcher;
use gazette_core::{
    CrawlOptions, Crawler, ErrorHandling, Publisher, Registry, ScraperConfig, SourceKind,
};

#[derive(Parser)]
#[command(name = "gazette", version, about = "News crawler and article extractor")]
struct Cli {
    /// Request timeout in seconds
    #[arg(long, global = true, env = "GAZETTE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// User-Agent sent with every request
    #[arg(long, global = true, env = "GAZETTE_USER_AGENT")]
    user_agent: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl publishers and print articles as JSON lines
    Crawl {
        /// Publisher registry file (JSON)
        #[arg(short, long, env = "GAZETTE_PUBLISHERS")]
        publishers: PathBuf,

        /// Region codes to crawl (repeatable)
        #[arg(short, long)]
        region: Vec<String>,

        /// Publisher names to crawl (repeatable)
        #[arg(long = "publisher")]
        publisher: Vec<String>,

        /// Stop after this many results
        #[arg(short, long)]
        max_articles: Option<usize>,

        /// Skip articles with missing or failed validated attributes
        #[arg(long, default_value_t = false)]
        only_complete: bool,

        /// raise, catch or suppress
        #[arg(short, long, default_value_t = ErrorHandling::Suppress)]
        error_handling: ErrorHandling,

        /// Source kinds to read: rss, sitemap, news_map (repeatable)
        #[arg(short, long)]
        source: Vec<SourceKind>,

        /// Minimum delay between crawl rounds in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Minimum spacing between requests to one host in milliseconds
        #[arg(long, default_value_t = 1000)]
        host_delay_ms: u64,

        /// Documents fetched concurrently per publisher
        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,

        /// Yield documents as soon as they are ready instead of in source order
        #[arg(long, default_value_t = false)]
        unordered: bool,
    },

    /// Fetch one page and print its extraction record
    Extract {
        /// Page URL
        #[arg(short, long)]
        url: String,
    },

    /// List regions and publishers of a registry file
    List {
        /// Publisher registry file (JSON)
        #[arg(short, long, env = "GAZETTE_PUBLISHERS")]
        publishers: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr, stdout carries JSON only
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gazette=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    configure_session(cli.timeout_secs, cli.user_agent);

    match cli.command {
        Commands::Crawl {
            publishers,
            region,
            publisher,
            max_articles,
            only_complete,
            error_handling,
            source,
            delay_ms,
            host_delay_ms,
            concurrency,
            unordered,
        } => {
            let registry = load_registry(&publishers)?;
            let selected = registry
                .select(&region, &publisher)
                .context("Invalid publisher selection")?;
            if selected.is_empty() {
                bail!("No publishers selected");
            }

            let mut options = CrawlOptions::default()
                .with_only_complete(only_complete)
                .with_error_handling(error_handling)
                .with_sources(source);
            if let Some(max) = max_articles {
                options = options.with_max_articles(max);
            }
            if let Some(ms) = delay_ms {
                options = options.with_delay(Duration::from_millis(ms));
            }

            let config = ScraperConfig::default()
                .with_fetch_concurrency(concurrency)
                .with_preserve_order(!unordered);
            let throttle = ThrottleConfig::new(Duration::from_millis(host_delay_ms))
                .with_jitter(Duration::from_millis(host_delay_ms / 2));

            cmd_crawl(selected, options, config, throttle).await?;
        }
        Commands::Extract { url } => cmd_extract(&url).await?,
        Commands::List { publishers } => cmd_list(&publishers)?,
    }

    Ok(())
}

fn configure_session(timeout_secs: Option<u64>, user_agent: Option<String>) {
    let mut config: SessionConfig = session::default_config();
    if let Some(secs) = timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(ua) = user_agent {
        config = config.with_user_agent(ua);
    }
    tracing::debug!(timeout_secs = config.timeout.as_secs(), user_agent = %config.user_agent, "Session defaults");
    session::set_default(config);
}

fn load_registry(path: &Path) -> Result<Registry> {
    let catalog = RuleSetCatalog::builtin().context("Failed to build rule sets")?;
    Registry::load(path, &catalog)
        .with_context(|| format!("Failed to load publisher registry: {}", path.display()))
}

async fn cmd_crawl(
    publishers: Vec<Arc<Publisher>>,
    options: CrawlOptions,
    config: ScraperConfig,
    throttle: ThrottleConfig,
) -> Result<()> {
    let http = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let fetcher = ThrottledFetcher::new(http.clone(), throttle);
    let reader = XmlFeedReader::new(http);
    let crawler = Crawler::new(publishers, fetcher, reader).with_config(config);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping crawl");
                cancel.cancel();
            }
        }
    });

    let mut results = std::pin::pin!(crawler.crawl(options).take_until(cancel.cancelled_owned()));
    let mut written = 0usize;
    while let Some(result) = results.next().await {
        let article = result.context("Crawl aborted")?;
        println!("{}", serde_json::to_string(&article)?);
        written += 1;
    }

    tracing::info!(articles = written, "Crawl finished");
    Ok(())
}

async fn cmd_extract(url: &str) -> Result<()> {
    let catalog = RuleSetCatalog::builtin().context("Failed to build rule sets")?;
    let rules = catalog
        .get(GENERIC)
        .context("Generic rule set missing")?;

    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let page = fetcher.fetch(url).await.with_context(|| format!("Failed to fetch {url}"))?;
    tracing::info!(bytes = page.content.len(), responded_url = %page.responded_url, "Fetched page");

    match extract_page(rules, &page).context("Extraction failed")? {
        Extraction::Filtered { filter } => {
            tracing::warn!(%filter, "Page rejected by filter");
            println!("{}", serde_json::json!({ "url": page.responded_url, "filtered_by": filter }));
        }
        Extraction::Extracted(record) => {
            if !record.is_complete() {
                tracing::warn!(incomplete = ?record.incomplete(), "Some validated attributes are missing");
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

fn cmd_list(path: &Path) -> Result<()> {
    let registry = load_registry(path)?;
    for code in registry.regions() {
        println!("{code}:");
        for publisher in registry.region(code).unwrap_or_default() {
            let kinds: Vec<_> = publisher.source_kinds().iter().map(SourceKind::as_str).collect();
            println!("  {} ({}) [{}]", publisher.name, publisher.domain, kinds.join(", "));
        }
    }
    println!("\nTotal: {} publishers", registry.len());
    Ok(())
}
