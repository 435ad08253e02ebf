//! RSS/Atom feeds and XML sitemaps.

use std::io::Read;

use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use gazette_core::error::AppError;
use gazette_core::traits::{FeedReader, Sitemap};

use crate::fetcher::{Download, ReqwestFetcher};

/// [`FeedReader`] that downloads through a [`ReqwestFetcher`].
#[derive(Clone)]
pub struct XmlFeedReader {
    fetcher: ReqwestFetcher,
}

impl XmlFeedReader {
    pub fn new(fetcher: ReqwestFetcher) -> Self {
        Self { fetcher }
    }

    async fn document(&self, url: &str) -> Result<String, AppError> {
        let download = self.fetcher.download(url).await?;
        decode(url, download)
    }
}

impl FeedReader for XmlFeedReader {
    async fn read_feed(&self, url: &str) -> Result<Vec<String>, AppError> {
        let xml = self.document(url).await?;
        let links = parse_feed(&xml)?;
        tracing::debug!(%url, links = links.len(), "Read feed");
        Ok(links)
    }

    async fn read_sitemap(&self, url: &str) -> Result<Sitemap, AppError> {
        let xml = self.document(url).await?;
        parse_sitemap(&xml)
    }
}

fn is_gzip(url: &str, download: &Download) -> bool {
    let gzip_type = download
        .content_type
        .as_deref()
        .is_some_and(|c| c.contains("application/x-gzip") || c.contains("application/gzip"));
    let gzip_path = url.ends_with(".gz") || download.responded_url.ends_with(".gz");
    // Magic bytes guard against servers that already decompressed the body.
    (gzip_type || gzip_path) && download.bytes.starts_with(&[0x1f, 0x8b])
}

fn decode(url: &str, download: Download) -> Result<String, AppError> {
    if is_gzip(url, &download) {
        let mut xml = String::new();
        GzDecoder::new(&download.bytes[..])
            .read_to_string(&mut xml)
            .map_err(|e| AppError::FeedError(format!("invalid gzip body from {url}: {e}")))?;
        return Ok(xml);
    }
    String::from_utf8(download.bytes)
        .map_err(|e| AppError::FeedError(format!("{url} is not valid UTF-8: {e}")))
}

fn xml_error(e: impl std::fmt::Display) -> AppError {
    AppError::FeedError(format!("invalid XML: {e}"))
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, AppError> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// Article links of an RSS 2.0 or Atom document, in document order.
///
/// RSS uses `item/link` text. Atom uses `entry/link/@href`, preferring
/// `rel="alternate"` (or no `rel`) over other relations.
pub fn parse_feed(xml: &str) -> Result<Vec<String>, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut links = Vec::new();
    let mut text = String::new();
    let mut root_seen = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                root_seen = true;
                let name = e.local_name().as_ref().to_vec();
                if name == b"link" && path.last().is_some_and(|p| p == b"entry") {
                    links.extend(atom_link(&e)?);
                }
                path.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                root_seen = true;
                if e.local_name().as_ref() == b"link" && path.last().is_some_and(|p| p == b"entry") {
                    links.extend(atom_link(&e)?);
                }
            }
            Event::Text(t) => text.push_str(&t.unescape().map_err(xml_error)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let closed = path.pop();
                let in_item = path.last().is_some_and(|p| p == b"item");
                if closed.as_deref() == Some(b"link".as_slice()) && in_item {
                    let link = text.trim();
                    if !link.is_empty() {
                        links.push(link.to_string());
                    }
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(AppError::FeedError("empty feed document".to_string()));
    }
    Ok(links)
}

fn atom_link(element: &BytesStart<'_>) -> Result<Option<String>, AppError> {
    let rel = attribute(element, b"rel")?;
    if rel.as_deref().is_some_and(|r| r != "alternate") {
        return Ok(None);
    }
    Ok(attribute(element, b"href")?.filter(|href| !href.trim().is_empty()))
}

/// Decodes a sitemap (`urlset/url/loc`) or sitemap index
/// (`sitemapindex/sitemap/loc`). News sitemaps are plain url sets.
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<Vec<u8>> = None;
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut locs = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                root.get_or_insert_with(|| name.clone());
                path.push(name);
                text.clear();
            }
            Event::Text(t) => text.push_str(&t.unescape().map_err(xml_error)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(_) => {
                let closed = path.pop();
                let parent = path.last().map(Vec::as_slice);
                if closed.as_deref() == Some(b"loc".as_slice())
                    && matches!(parent, Some(b"url") | Some(b"sitemap"))
                {
                    let loc = text.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match root.as_deref() {
        Some(b"sitemapindex") => Ok(Sitemap::Index(locs)),
        Some(b"urlset") => Ok(Sitemap::UrlSet(locs)),
        Some(other) => Err(AppError::FeedError(format!(
            "unexpected sitemap root element '{}'",
            String::from_utf8_lossy(other)
        ))),
        None => Err(AppError::FeedError("empty sitemap document".to_string())),
    }
}
