use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use gazette_client::XmlFeedReader;
use gazette_core::error::AppError;
use gazette_core::traits::{FeedReader, Sitemap};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::integration::common::fetcher;

#[tokio::test]
async fn reads_rss_feed() {
    let server = MockServer::start().await;
    let rss = format!(
        r#"<rss version="2.0"><channel><title>T</title>
           <item><link>{0}/a</link></item>
           <item><link>{0}/b</link></item>
           </channel></rss>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(rss, "application/rss+xml"))
        .mount(&server)
        .await;

    let reader = XmlFeedReader::new(fetcher());
    let links = reader.read_feed(&format!("{}/rss", server.uri())).await.unwrap();

    assert_eq!(links, vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())]);
}

#[tokio::test]
async fn reads_gzipped_sitemap_index() {
    let server = MockServer::start().await;
    let index = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
        <sitemap><loc>https://news.example/sitemap-2024.xml</loc></sitemap>
    </sitemapindex>"#;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(index.as_bytes()).unwrap();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(encoder.finish().unwrap(), "application/x-gzip"))
        .mount(&server)
        .await;

    let reader = XmlFeedReader::new(fetcher());
    let sitemap = reader
        .read_sitemap(&format!("{}/sitemap.xml.gz", server.uri()))
        .await
        .unwrap();

    assert_eq!(
        sitemap,
        Sitemap::Index(vec!["https://news.example/sitemap-2024.xml".to_string()])
    );
}

#[tokio::test]
async fn malformed_sitemap_is_a_feed_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Not here</body></html>"))
        .mount(&server)
        .await;

    let reader = XmlFeedReader::new(fetcher());
    let err = reader
        .read_sitemap(&format!("{}/sitemap.xml", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::FeedError(_)));
}
