use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::record::ExtractionRecord;
use crate::traits::FetchedPage;

/// Where an article came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    pub publisher: String,
    pub requested_url: String,
    /// URL after redirects. `None` if the page was never fetched.
    pub responded_url: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ArticleSource {
    pub fn from_page(publisher: &str, page: &FetchedPage) -> Self {
        Self {
            publisher: publisher.to_string(),
            requested_url: page.requested_url.clone(),
            responded_url: Some(page.responded_url.clone()),
            fetched_at: Some(page.fetched_at),
        }
    }

    pub fn unfetched(publisher: &str, url: &str) -> Self {
        Self {
            publisher: publisher.to_string(),
            requested_url: url.to_string(),
            responded_url: None,
            fetched_at: None,
        }
    }

    /// The responded URL when known, else the requested one.
    pub fn url(&self) -> &str {
        self.responded_url.as_deref().unwrap_or(&self.requested_url)
    }
}

/// One processed document: its origin plus the extraction record, or the
/// error that kept it from being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub source: ArticleSource,
    pub record: ExtractionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl Article {
    pub fn new(source: ArticleSource, record: ExtractionRecord) -> Self {
        Self {
            source,
            record,
            exception: None,
        }
    }

    /// A failure record for a document that could not be processed.
    pub fn failed(source: ArticleSource, error: impl fmt::Display) -> Self {
        Self {
            source,
            record: ExtractionRecord::new(),
            exception: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.exception.is_some()
    }

    /// Typed view of any attribute; `None` when missing, failed or mistyped.
    pub fn get<T: DeserializeOwned>(&self, attribute: &str) -> Option<T> {
        self.record.typed(attribute)
    }

    pub fn title(&self) -> Option<String> {
        self.get("title")
    }

    pub fn authors(&self) -> Vec<String> {
        self.get("authors").unwrap_or_default()
    }

    pub fn publishing_date(&self) -> Option<DateTime<FixedOffset>> {
        self.get("publishing_date")
    }

    pub fn body(&self) -> Option<ArticleBody> {
        self.get("body")
    }

    pub fn topics(&self) -> Vec<String> {
        self.get("topics").unwrap_or_default()
    }

    pub fn images(&self) -> Vec<Image> {
        self.get("images").unwrap_or_default()
    }

    pub fn language(&self) -> Option<String> {
        self.get("language")
    }

    /// Title and body as plain text.
    pub fn plaintext(&self) -> String {
        let mut parts = Vec::new();
        if let Some(title) = self.title() {
            parts.push(title);
        }
        if let Some(body) = self.body() {
            parts.push(body.to_string());
        }
        parts.join("\n\n")
    }
}

/// A titled block of paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleSection {
    #[serde(default)]
    pub headline: Vec<String>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleBody {
    #[serde(default)]
    pub summary: Vec<String>,
    #[serde(default)]
    pub sections: Vec<ArticleSection>,
}

impl ArticleBody {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.sections.iter().all(|s| s.paragraphs.is_empty())
    }
}

impl fmt::Display for ArticleBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blocks = self.summary.iter().chain(
            self.sections
                .iter()
                .flat_map(|s| s.headline.iter().chain(s.paragraphs.iter())),
        );
        let text: Vec<&str> = blocks.map(String::as_str).collect();
        write!(f, "{}", text.join("\n\n"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}
