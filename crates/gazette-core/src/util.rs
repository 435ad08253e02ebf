//! Helpers for writing extraction steps: CSS selection, meta tags, JSON-LD,
//! and parsing of authors, topics and dates.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::article::{ArticleBody, ArticleSection};
use crate::error::StepError;

static AUTHOR_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:,|;|&|\band\b|\bund\b|\bet\b|\by\b|\|)\s*")
        .expect("author separator pattern is valid")
});

static AUTHOR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:by|von|par|por)\s+").expect("prefix pattern is valid"));

/// Parses a CSS selector, mapping failures to a [`StepError`].
pub fn selector(css: &str) -> Result<Selector, StepError> {
    Selector::parse(css).map_err(|e| StepError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// All elements matching `css`, in document order.
pub fn select<'a>(tree: &'a Html, css: &str) -> Result<Vec<ElementRef<'a>>, StepError> {
    let selector = selector(css)?;
    Ok(tree.select(&selector).collect())
}

/// Whitespace-normalized text of every element matching `css`, empty ones dropped.
pub fn select_text(tree: &Html, css: &str) -> Result<Vec<String>, StepError> {
    Ok(select(tree, css)?
        .into_iter()
        .map(|el| text_of(&el))
        .filter(|t| !t.is_empty())
        .collect())
}

/// Text of the first element matching `css`.
pub fn first_text(tree: &Html, css: &str) -> Result<Option<String>, StepError> {
    Ok(select_text(tree, css)?.into_iter().next())
}

pub fn text_of(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collects `<meta>` tags into a `name -> content` object.
///
/// Keys come from `name`, `property` or `itemprop`; the first occurrence of a
/// key wins.
pub fn meta_tags(tree: &Html) -> Map<String, Value> {
    let mut tags = Map::new();
    let Ok(selector) = selector("meta[content]") else {
        return tags;
    };
    for meta in tree.select(&selector) {
        let element = meta.value();
        let key = element
            .attr("name")
            .or_else(|| element.attr("property"))
            .or_else(|| element.attr("itemprop"));
        if let (Some(key), Some(content)) = (key, element.attr("content")) {
            tags.entry(key.to_string())
                .or_insert_with(|| Value::String(content.trim().to_string()));
        }
    }
    tags
}

/// Every JSON-LD object on the page. Top-level arrays and `@graph` lists are
/// flattened; scripts that are not valid JSON are skipped.
pub fn ld_json(tree: &Html) -> Vec<Value> {
    let mut objects = Vec::new();
    let Ok(selector) = selector(r#"script[type="application/ld+json"]"#) else {
        return objects;
    };
    for script in tree.select(&selector) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => flatten_ld(value, &mut objects),
            Err(e) => tracing::debug!(error = %e, "Skipping invalid JSON-LD block"),
        }
    }
    objects
}

fn flatten_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_ld(v, out)),
        Value::Object(mut obj) => {
            if let Some(graph) = obj.remove("@graph") {
                flatten_ld(graph, out);
            }
            if obj.keys().any(|k| k != "@context") {
                out.push(Value::Object(obj));
            }
        }
        _ => {}
    }
}

/// JSON-LD objects whose `@type` is (or includes) one of `types`.
pub fn ld_of_type<'a>(objects: &'a [Value], types: &[&str]) -> Vec<&'a Value> {
    objects
        .iter()
        .filter(|obj| match obj.get("@type") {
            Some(Value::String(t)) => types.contains(&t.as_str()),
            Some(Value::Array(ts)) => ts
                .iter()
                .filter_map(Value::as_str)
                .any(|t| types.contains(&t)),
            _ => false,
        })
        .collect()
}

/// Schema.org types that describe an article.
pub const ARTICLE_TYPES: &[&str] = &[
    "Article",
    "NewsArticle",
    "ReportageNewsArticle",
    "AnalysisNewsArticle",
    "OpinionNewsArticle",
    "BlogPosting",
    "LiveBlogPosting",
    "WebPage",
];

/// Names from a schema.org `author`/`creator` value (string, person, or list).
pub fn ld_names(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => parse_authors(s),
        Value::Array(items) => items.iter().flat_map(ld_names).collect(),
        Value::Object(obj) => obj
            .get("name")
            .map(ld_names)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Splits a byline into author names.
///
/// `"By Ada Lovelace and Grace Hopper, Alan Turing"` yields three names.
/// Duplicates are removed, order is preserved.
pub fn parse_authors(byline: &str) -> Vec<String> {
    let byline = AUTHOR_PREFIX.replace(byline.trim(), "");
    let mut authors: Vec<String> = Vec::new();
    for name in AUTHOR_SEPARATORS.split(&byline) {
        let name = normalize_whitespace(name);
        if !name.is_empty() && !authors.contains(&name) {
            authors.push(name);
        }
    }
    authors
}

/// Splits a keyword list on commas or semicolons.
pub fn parse_topics(raw: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();
    for topic in raw.split([',', ';']) {
        let topic = normalize_whitespace(topic);
        if !topic.is_empty() && !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    topics
}

/// Parses the date formats commonly found in article metadata.
///
/// Timestamps without an offset and bare dates are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    None
}

/// Assembles an article body in document order.
///
/// Elements matching `subheadline` open a new section; elements matching
/// `paragraph` are appended to the current one. `summary` (optional) selects
/// the lead paragraphs.
pub fn extract_body(
    tree: &Html,
    summary: Option<&str>,
    subheadline: &str,
    paragraph: &str,
) -> Result<ArticleBody, StepError> {
    let summary = match summary {
        Some(css) => select_text(tree, css)?,
        None => Vec::new(),
    };

    let subheadline_sel = selector(subheadline)?;
    let combined = selector(&format!("{subheadline}, {paragraph}"))?;

    let mut sections = vec![ArticleSection::default()];
    for element in tree.select(&combined) {
        let text = text_of(&element);
        if text.is_empty() {
            continue;
        }
        if subheadline_sel.matches(&element) {
            sections.push(ArticleSection {
                headline: vec![text],
                paragraphs: Vec::new(),
            });
        } else if let Some(current) = sections.last_mut() {
            current.paragraphs.push(text);
        }
    }
    sections.retain(|s| !s.headline.is_empty() || !s.paragraphs.is_empty());

    Ok(ArticleBody { summary, sections })
}
