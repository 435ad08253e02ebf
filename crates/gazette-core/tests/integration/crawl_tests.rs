use std::sync::Arc;

use futures::StreamExt;

use gazette_core::publisher::{Publisher, SourceSpec};
use gazette_core::rules::RuleSetCatalog;
use gazette_core::traits::Sitemap;
use gazette_core::{CrawlOptions, Crawler, ErrorHandling, Registry, RegistryConfig};

use crate::integration::common::{StaticFeedReader, StaticFetcher, article_page, video_page};

const REGISTRY: &str = r#"{
    "regions": {
        "us": [
            { "name": "daily", "domain": "https://daily.example",
              "sources": [{ "kind": "rss", "url": "https://daily.example/rss" }] }
        ],
        "uk": [
            { "name": "herald", "domain": "https://herald.example",
              "sources": [{ "kind": "sitemap", "url": "https://herald.example/sitemap.xml" }],
              "url_filter": "/live/" }
        ]
    }
}"#;

fn registry() -> Registry {
    let config = RegistryConfig::from_json(REGISTRY).unwrap();
    Registry::from_config(config, &RuleSetCatalog::builtin().unwrap()).unwrap()
}

fn feeds() -> StaticFeedReader {
    StaticFeedReader::new(
        &[(
            "https://daily.example/rss",
            &[
                "https://daily.example/news/1",
                "https://daily.example/video/2",
                "https://daily.example/news/3",
            ],
        )],
        &[
            (
                "https://herald.example/sitemap.xml",
                Sitemap::Index(vec!["https://herald.example/sitemap-1.xml".to_string()]),
            ),
            (
                "https://herald.example/sitemap-1.xml",
                Sitemap::UrlSet(vec![
                    "https://herald.example/story/a".to_string(),
                    "https://herald.example/live/b".to_string(),
                    "https://herald.example/story/c".to_string(),
                ]),
            ),
        ],
    )
}

fn fetcher() -> StaticFetcher {
    StaticFetcher::new(&[
        ("https://daily.example/news/1", article_page("Rates rise", "By Jane Doe", "2024-03-01T08:00:00Z")),
        ("https://daily.example/video/2", video_page("Watch this")),
        ("https://herald.example/story/a", article_page("Storm warning", "John Roe", "2024-03-02")),
        ("https://herald.example/live/b", article_page("Live blog", "Desk", "2024-03-02")),
        ("https://herald.example/story/c", article_page("Harvest report", "Ann Poe and Bo Li", "2024-03-03")),
    ])
}

#[tokio::test]
async fn crawl_yields_articles_from_every_region() {
    let registry = registry();
    let fetcher = fetcher();
    let crawler = Crawler::new(registry.select(&[], &[]).unwrap(), fetcher.clone(), feeds());

    let articles: Vec<_> = crawler
        .crawl(CrawlOptions::default())
        .map(|result| result.unwrap())
        .collect()
        .await;

    let mut titles: Vec<_> = articles.iter().filter_map(|a| a.title()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Harvest report", "Rates rise", "Storm warning"]);

    let rates = articles.iter().find(|a| a.title().as_deref() == Some("Rates rise")).unwrap();
    assert_eq!(rates.source.publisher, "daily");
    assert_eq!(rates.authors(), vec!["Jane Doe".to_string()]);
    assert_eq!(rates.language().as_deref(), Some("en"));
    assert_eq!(rates.topics(), vec!["politics".to_string(), "economy".to_string()]);
    assert_eq!(
        rates.publishing_date().unwrap().to_rfc3339(),
        "2024-03-01T08:00:00+00:00"
    );
    let body = rates.body().unwrap();
    assert_eq!(body.summary, vec!["The short version.".to_string()]);
    assert_eq!(body.sections[0].headline, vec!["First part".to_string()]);
    assert!(rates.record.is_complete());

    let harvest = articles.iter().find(|a| a.title().as_deref() == Some("Harvest report")).unwrap();
    assert_eq!(harvest.authors(), vec!["Ann Poe".to_string(), "Bo Li".to_string()]);

    // Publisher URL filter keeps the live blog from ever being fetched.
    assert!(!fetcher.fetched().iter().any(|u| u.contains("/live/")));
    // The missing page was fetched and suppressed.
    assert!(fetcher.fetched().contains(&"https://daily.example/news/3".to_string()));
}

#[tokio::test]
async fn crawl_catches_failures_as_articles() {
    let registry = registry();
    let crawler = Crawler::new(registry.select(&["us".to_string()], &[]).unwrap(), fetcher(), feeds());

    let articles: Vec<_> = crawler
        .crawl(CrawlOptions::default().with_error_handling(ErrorHandling::Catch))
        .map(|result| result.unwrap())
        .collect()
        .await;

    assert_eq!(articles.len(), 2);
    assert!(!articles[0].is_failure());
    assert!(articles[1].is_failure());
    assert_eq!(articles[1].source.requested_url, "https://daily.example/news/3");
    assert!(articles[1].exception.as_deref().unwrap().contains("404"));
}

#[tokio::test]
async fn crawl_honors_global_cap() {
    let registry = registry();
    let crawler = Crawler::new(registry.select(&[], &[]).unwrap(), fetcher(), feeds());

    let articles: Vec<_> = crawler
        .crawl(CrawlOptions::default().with_max_articles(2))
        .collect()
        .await;

    assert_eq!(articles.len(), 2);
    assert!(articles.iter().all(|a| a.is_ok()));
}

#[tokio::test]
async fn raise_ends_crawl_with_annotated_error() {
    let publisher = Arc::new(
        Publisher::new(
            "daily",
            "https://daily.example",
            RuleSetCatalog::builtin().unwrap().get("generic").unwrap().clone(),
        )
        .with_source(SourceSpec::rss("https://daily.example/rss")),
    );
    let crawler = Crawler::new(vec![publisher], fetcher(), feeds());

    let results: Vec<_> = crawler
        .crawl(CrawlOptions::default().with_error_handling(ErrorHandling::Raise))
        .collect()
        .await;

    assert_eq!(results.len(), 2);
    let err = results[1].as_ref().unwrap_err();
    assert!(err.to_string().contains("https://daily.example/news/3"));
}

#[tokio::test]
async fn articles_serialize_to_json() {
    let registry = registry();
    let crawler = Crawler::new(registry.select(&[], &["daily".to_string()]).unwrap(), fetcher(), feeds());

    let article = crawler
        .crawl(CrawlOptions::default())
        .next()
        .await
        .unwrap()
        .unwrap();
    let json = serde_json::to_value(&article).unwrap();

    assert_eq!(json["source"]["publisher"], "daily");
    assert_eq!(json["source"]["requested_url"], "https://daily.example/news/1");
}
