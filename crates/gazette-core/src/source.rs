//! Turns a publisher's feeds and sitemaps into one lazy URL stream.
//!
//! Sources are read one at a time, in declaration order, and only when the
//! consumer asks for more URLs. Sitemap indexes are expanded depth-first: all
//! URLs of a nested sitemap are emitted before its next sibling is read.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::filter::UrlFilter;
use crate::publisher::{Publisher, SourceKind, SourceSpec};
use crate::report::{ScrapeEvent, ScrapeReporter, TracingReporter};
use crate::traits::{FeedReader, Sitemap};

/// Lazy, deduplicated URL sequence over a publisher's sources.
#[derive(Clone)]
pub struct SourceReader<R> {
    reader: R,
    publisher: String,
    sources: Vec<Arc<SourceSpec>>,
    url_filters: Vec<UrlFilter>,
    reporter: Arc<dyn ScrapeReporter>,
}

impl<R: FeedReader + 'static> SourceReader<R> {
    /// Reads the publisher's sources of the given kinds (all kinds if empty).
    pub fn new(reader: R, publisher: &Publisher, kinds: &[SourceKind]) -> Self {
        Self {
            reader,
            publisher: publisher.name.clone(),
            sources: publisher
                .sources_of(kinds)
                .cloned()
                .map(Arc::new)
                .collect(),
            url_filters: publisher.url_filter.iter().cloned().collect(),
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Adds a filter on top of the publisher's and sources' own.
    pub fn with_url_filter(mut self, filter: UrlFilter) -> Self {
        self.url_filters.push(filter);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ScrapeReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// A fresh URL stream. Each call starts over from the first source.
    pub fn urls(&self) -> BoxStream<'static, String> {
        let state = ReadState {
            reader: self.reader.clone(),
            publisher: self.publisher.clone(),
            pending: self.sources.iter().cloned().collect(),
            work: Vec::new(),
            url_filters: self.url_filters.clone(),
            reporter: Arc::clone(&self.reporter),
            seen: HashSet::new(),
            visited: HashSet::new(),
        };
        stream::unfold(state, |mut state| async move {
            let url = state.next_url().await?;
            Some((url, state))
        })
        .boxed()
    }
}

enum Work {
    Read { source: Arc<SourceSpec>, url: String },
    Emit { source: Arc<SourceSpec>, url: String },
}

struct ReadState<R> {
    reader: R,
    publisher: String,
    pending: VecDeque<Arc<SourceSpec>>,
    /// Top of the stack is processed next.
    work: Vec<Work>,
    url_filters: Vec<UrlFilter>,
    reporter: Arc<dyn ScrapeReporter>,
    seen: HashSet<String>,
    visited: HashSet<String>,
}

impl<R: FeedReader> ReadState<R> {
    async fn next_url(&mut self) -> Option<String> {
        loop {
            let work = match self.work.pop() {
                Some(work) => work,
                None => {
                    let source = self.pending.pop_front()?;
                    Work::Read {
                        url: source.url.clone(),
                        source,
                    }
                }
            };
            match work {
                Work::Emit { source, url } => {
                    if self.accept(&source, &url) {
                        return Some(url);
                    }
                }
                Work::Read { source, url } => self.read(source, url).await,
            }
        }
    }

    fn accept(&mut self, source: &SourceSpec, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        let rejected = source.url_filter.iter().any(|f| f.rejects(url))
            || self.url_filters.iter().any(|f| f.rejects(url));
        if rejected {
            self.reporter.report(ScrapeEvent::UrlSkipped {
                publisher: &self.publisher,
                url,
            });
            return false;
        }
        self.seen.insert(url.to_string());
        true
    }

    async fn read(&mut self, source: Arc<SourceSpec>, url: String) {
        if !self.visited.insert(url.clone()) {
            return;
        }

        let listing = match source.kind {
            SourceKind::Rss => self.reader.read_feed(&url).await.map(Sitemap::UrlSet),
            SourceKind::Sitemap | SourceKind::NewsMap => self.reader.read_sitemap(&url).await,
        };

        match listing {
            Ok(Sitemap::UrlSet(urls)) => {
                self.reporter.report(ScrapeEvent::SourceRead {
                    publisher: &self.publisher,
                    source: &url,
                    urls: urls.len(),
                });
                self.schedule(&source, urls, |source, url| Work::Emit { source, url });
            }
            Ok(Sitemap::Index(sitemaps)) => {
                if !source.recursive {
                    tracing::debug!(publisher = %self.publisher, source = %url, "Not following sitemap index");
                    return;
                }
                let sitemaps: Vec<String> = sitemaps
                    .into_iter()
                    .filter(|s| !source.sitemap_filter.as_ref().is_some_and(|f| f.rejects(s)))
                    .collect();
                self.reporter.report(ScrapeEvent::SourceRead {
                    publisher: &self.publisher,
                    source: &url,
                    urls: sitemaps.len(),
                });
                self.schedule(&source, sitemaps, |source, url| Work::Read { source, url });
            }
            Err(e) => {
                self.reporter.report(ScrapeEvent::SourceFailed {
                    publisher: &self.publisher,
                    source: &url,
                    error: &e.to_string(),
                });
            }
        }
    }

    /// Pushes entries so they are processed in listing order, or reversed if
    /// the source asks for it.
    fn schedule(
        &mut self,
        source: &Arc<SourceSpec>,
        mut entries: Vec<String>,
        make: impl Fn(Arc<SourceSpec>, String) -> Work,
    ) {
        if !source.reverse {
            entries.reverse();
        }
        self.work
            .extend(entries.into_iter().map(|url| make(Arc::clone(source), url)));
    }
}
