use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::AppError;
use crate::filter::UrlFilter;
use crate::rule_set::VersionedRuleSet;

/// Kind of URL source a publisher declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS or Atom feed.
    Rss,
    Sitemap,
    /// Sitemap restricted to recent news.
    NewsMap,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Sitemap => "sitemap",
            SourceKind::NewsMap => "news_map",
        }
    }

    pub fn is_sitemap(&self) -> bool {
        matches!(self, SourceKind::Sitemap | SourceKind::NewsMap)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "rss" => Ok(SourceKind::Rss),
            "sitemap" => Ok(SourceKind::Sitemap),
            "news_map" | "newsmap" => Ok(SourceKind::NewsMap),
            _ => Err(format!("Unknown source kind: {}", s)),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One configured feed or sitemap.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub url: String,
    /// Emit sitemap entries last-to-first.
    #[serde(default)]
    pub reverse: bool,
    /// Follow nested sitemaps of a sitemap index.
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Rejects article URLs of this source.
    #[serde(default)]
    pub url_filter: Option<UrlFilter>,
    /// Rejects nested sitemap URLs before they are read.
    #[serde(default)]
    pub sitemap_filter: Option<UrlFilter>,
}

impl SourceSpec {
    pub fn new(kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            reverse: false,
            recursive: true,
            url_filter: None,
            sitemap_filter: None,
        }
    }

    pub fn rss(url: impl Into<String>) -> Self {
        Self::new(SourceKind::Rss, url)
    }

    pub fn sitemap(url: impl Into<String>) -> Self {
        Self::new(SourceKind::Sitemap, url)
    }

    pub fn news_map(url: impl Into<String>) -> Self {
        Self::new(SourceKind::NewsMap, url)
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    pub fn with_url_filter(mut self, filter: UrlFilter) -> Self {
        self.url_filter = Some(filter);
        self
    }

    pub fn with_sitemap_filter(mut self, filter: UrlFilter) -> Self {
        self.sitemap_filter = Some(filter);
        self
    }
}

/// A news publisher: identity, sources and versioned rules.
#[derive(Debug, Clone)]
pub struct Publisher {
    pub name: String,
    pub domain: String,
    pub language: Option<String>,
    pub sources: Vec<SourceSpec>,
    /// Rejects article URLs from every source of this publisher.
    pub url_filter: Option<UrlFilter>,
    pub rules: VersionedRuleSet,
}

impl Publisher {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, rules: VersionedRuleSet) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            language: None,
            sources: Vec::new(),
            url_filter: None,
            rules,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_source(mut self, source: SourceSpec) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_url_filter(mut self, filter: UrlFilter) -> Self {
        self.url_filter = Some(filter);
        self
    }

    /// Sources of the given kinds, in declaration order. An empty slice
    /// means every kind.
    pub fn sources_of<'a>(&'a self, kinds: &'a [SourceKind]) -> impl Iterator<Item = &'a SourceSpec> {
        self.sources
            .iter()
            .filter(move |s| kinds.is_empty() || kinds.contains(&s.kind))
    }

    pub fn source_kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.sources.iter().map(|s| s.kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// Publishers grouped by region code.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    regions: BTreeMap<String, Vec<Arc<Publisher>>>,
}

impl Registry {
    /// Builds a registry, rejecting publisher names used more than once.
    pub fn new<I, R>(regions: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (R, Vec<Publisher>)>,
        R: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut map: BTreeMap<String, Vec<Arc<Publisher>>> = BTreeMap::new();
        for (region, publishers) in regions {
            let region = region.into();
            for publisher in publishers {
                if !seen.insert(publisher.name.clone()) {
                    return Err(AppError::ConfigError(format!(
                        "duplicate publisher name '{}' (region '{region}')",
                        publisher.name
                    )));
                }
                map.entry(region.clone())
                    .or_default()
                    .push(Arc::new(publisher));
            }
        }
        Ok(Self { regions: map })
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn region(&self, code: &str) -> Option<&[Arc<Publisher>]> {
        self.regions.get(code).map(Vec::as_slice)
    }

    pub fn publishers(&self) -> impl Iterator<Item = &Arc<Publisher>> {
        self.regions.values().flatten()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Publisher>> {
        self.publishers().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publishers from the named regions plus the named publishers, without
    /// duplicates. With no region and no name, every publisher is selected.
    pub fn select(&self, regions: &[String], names: &[String]) -> Result<Vec<Arc<Publisher>>, AppError> {
        if regions.is_empty() && names.is_empty() {
            return Ok(self.publishers().cloned().collect());
        }

        let mut selected: Vec<Arc<Publisher>> = Vec::new();
        let mut push = |publisher: &Arc<Publisher>| {
            if !selected.iter().any(|p| p.name == publisher.name) {
                selected.push(Arc::clone(publisher));
            }
        };

        for code in regions {
            let publishers = self
                .region(code)
                .ok_or_else(|| AppError::ConfigError(format!("unknown region '{code}'")))?;
            publishers.iter().for_each(&mut push);
        }
        for name in names {
            let publisher = self
                .get(name)
                .ok_or_else(|| AppError::ConfigError(format!("unknown publisher '{name}'")))?;
            push(publisher);
        }
        Ok(selected)
    }
}
