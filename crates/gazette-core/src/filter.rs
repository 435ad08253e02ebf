//! URL filters (applied before fetching) and extraction filters (applied to
//! finished records).

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::AppError;
use crate::record::ExtractionRecord;

/// Decides whether a candidate URL is dropped before it is fetched.
#[derive(Clone)]
pub enum UrlFilter {
    /// Rejects URLs matching the pattern.
    Matching(Regex),
    /// Rejects URLs not matching the pattern.
    NotMatching(Regex),
    /// Rejects a URL if any inner filter does.
    Any(Vec<UrlFilter>),
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl UrlFilter {
    pub fn matching(pattern: &str) -> Result<Self, AppError> {
        Ok(Self::Matching(compile(pattern)?))
    }

    pub fn not_matching(pattern: &str) -> Result<Self, AppError> {
        Ok(Self::NotMatching(compile(pattern)?))
    }

    pub fn any(filters: impl IntoIterator<Item = UrlFilter>) -> Self {
        Self::Any(filters.into_iter().collect())
    }

    /// A filter rejecting every URL for which `f` returns `true`.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn rejects(&self, url: &str) -> bool {
        match self {
            UrlFilter::Matching(re) => re.is_match(url),
            UrlFilter::NotMatching(re) => !re.is_match(url),
            UrlFilter::Any(filters) => filters.iter().any(|f| f.rejects(url)),
            UrlFilter::Custom(f) => f(url),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern)
        .map_err(|e| AppError::ConfigError(format!("invalid URL pattern '{pattern}': {e}")))
}

impl fmt::Debug for UrlFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlFilter::Matching(re) => f.debug_tuple("Matching").field(&re.as_str()).finish(),
            UrlFilter::NotMatching(re) => {
                f.debug_tuple("NotMatching").field(&re.as_str()).finish()
            }
            UrlFilter::Any(filters) => f.debug_tuple("Any").field(filters).finish(),
            UrlFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A bare regex string deserializes to [`UrlFilter::Matching`].
impl<'de> Deserialize<'de> for UrlFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Regex::new(&pattern)
            .map(UrlFilter::Matching)
            .map_err(serde::de::Error::custom)
    }
}

/// Decides whether a finished extraction record is discarded.
pub trait ExtractionFilter: Send + Sync {
    fn reject(&self, record: &ExtractionRecord) -> bool;
}

impl<F> ExtractionFilter for F
where
    F: Fn(&ExtractionRecord) -> bool + Send + Sync,
{
    fn reject(&self, record: &ExtractionRecord) -> bool {
        self(record)
    }
}

/// Completeness gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requires {
    /// Every named attribute must be present, error-free and non-empty.
    Attributes(Vec<String>),
    /// No validated attribute may be empty or failed.
    Validated,
}

impl Requires {
    pub fn attributes<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Attributes(names.into_iter().map(Into::into).collect())
    }

    pub fn validated() -> Self {
        Self::Validated
    }
}

impl ExtractionFilter for Requires {
    fn reject(&self, record: &ExtractionRecord) -> bool {
        match self {
            Requires::Attributes(names) => names.iter().any(|name| !record.has(name)),
            Requires::Validated => !record.is_complete(),
        }
    }
}
