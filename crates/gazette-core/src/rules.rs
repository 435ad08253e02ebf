//! Built-in rule sets and the catalog publishers refer to by name.
//!
//! The `generic` rule set relies only on OpenGraph/meta tags, JSON-LD and
//! common article markup, so it gives usable results for most news sites
//! without per-publisher selectors.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::article::{ArticleBody, Image};
use crate::context::DocumentContext;
use crate::error::{AppError, StepError};
use crate::rule_set::{LD_JSON, META_TAGS, RuleSet, VersionedRuleSet};
use crate::step::Step;
use crate::util;

pub const GENERIC: &str = "generic";

/// Named rule sets available to the publisher registry.
#[derive(Debug, Clone, Default)]
pub struct RuleSetCatalog {
    entries: BTreeMap<String, VersionedRuleSet>,
}

impl RuleSetCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in rule sets.
    pub fn builtin() -> Result<Self, AppError> {
        Ok(Self::new().with(GENERIC, VersionedRuleSet::single(generic()?)))
    }

    pub fn with(mut self, name: impl Into<String>, rules: VersionedRuleSet) -> Self {
        self.entries.insert(name.into(), rules);
        self
    }

    pub fn get(&self, name: &str) -> Option<&VersionedRuleSet> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Rule set driven by meta tags and JSON-LD.
pub fn generic() -> Result<RuleSet, AppError> {
    RuleSet::new([
        Step::filter("not-an-article", |ctx| {
            Ok(meta(ctx, "og:type")?.is_some_and(|t| !t.eq_ignore_ascii_case("article")))
        }),
        Step::control("detect-language", |ctx| {
            let language = html_lang(ctx)?.or(meta(ctx, "og:locale")?).map(|l| primary_subtag(&l));
            ctx.set("language", language.map(Value::String).unwrap_or(Value::Null));
            Ok(())
        }),
        Step::attribute("title", title),
        Step::attribute("authors", authors),
        Step::attribute("publishing_date", publishing_date),
        Step::attribute("body", body),
        Step::attribute("topics", topics).no_validate(),
        Step::attribute("images", images).no_validate(),
        Step::attribute("language", |ctx| {
            Ok(ctx.get("language")?.as_str().map(str::to_string))
        })
        .no_validate(),
        Step::attribute("free_access", free_access).no_validate(),
    ])
}

fn meta(ctx: &DocumentContext<'_>, key: &str) -> Result<Option<String>, StepError> {
    let tags = ctx.get(META_TAGS)?;
    Ok(tags
        .get(key)
        .and_then(Value::as_str)
        .map(util::normalize_whitespace)
        .filter(|s| !s.is_empty()))
}

/// The first JSON-LD object describing an article.
fn ld_article(ctx: &DocumentContext<'_>) -> Result<Option<Value>, StepError> {
    let objects = ctx.get(LD_JSON)?;
    let objects = objects.as_array().map(Vec::as_slice).unwrap_or_default();
    Ok(util::ld_of_type(objects, util::ARTICLE_TYPES)
        .first()
        .map(|v| (*v).clone()))
}

fn html_lang(ctx: &DocumentContext<'_>) -> Result<Option<String>, StepError> {
    Ok(util::select(ctx.tree(), "html")?
        .first()
        .and_then(|el| el.value().attr("lang"))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string))
}

fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or(tag)
        .to_ascii_lowercase()
}

fn title(ctx: &DocumentContext<'_>) -> Result<Option<String>, StepError> {
    if let Some(title) = meta(ctx, "og:title")? {
        return Ok(Some(title));
    }
    if let Some(headline) = ld_article(ctx)?
        .as_ref()
        .and_then(|ld| ld.get("headline"))
        .and_then(Value::as_str)
        .map(util::normalize_whitespace)
        .filter(|s| !s.is_empty())
    {
        return Ok(Some(headline));
    }
    if let Some(h1) = util::first_text(ctx.tree(), "h1")? {
        return Ok(Some(h1));
    }
    util::first_text(ctx.tree(), "title")
}

fn authors(ctx: &DocumentContext<'_>) -> Result<Vec<String>, StepError> {
    if let Some(byline) = meta(ctx, "author")? {
        return Ok(util::parse_authors(&byline));
    }
    if let Some(ld) = ld_article(ctx)? {
        let names = ld.get("author").map(util::ld_names).unwrap_or_default();
        if !names.is_empty() {
            return Ok(names);
        }
    }
    let bylines = util::select_text(ctx.tree(), "[rel=author], .byline, .author")?;
    let mut names: Vec<String> = Vec::new();
    for name in bylines.iter().flat_map(|b| util::parse_authors(b)) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

fn publishing_date(ctx: &DocumentContext<'_>) -> Result<Option<DateTime<FixedOffset>>, StepError> {
    let mut candidates = Vec::new();
    candidates.extend(meta(ctx, "article:published_time")?);
    if let Some(ld) = ld_article(ctx)? {
        candidates.extend(ld.get("datePublished").and_then(Value::as_str).map(str::to_string));
    }
    candidates.extend(meta(ctx, "date")?);
    candidates.extend(
        util::select(ctx.tree(), "time[datetime]")?
            .first()
            .and_then(|el| el.value().attr("datetime"))
            .map(str::to_string),
    );
    Ok(candidates.iter().find_map(|raw| util::parse_date(raw)))
}

fn body(ctx: &DocumentContext<'_>) -> Result<Option<ArticleBody>, StepError> {
    for scope in ["article", "main", "body"] {
        let body = util::extract_body(
            ctx.tree(),
            Some(&format!("{scope} p.lead, {scope} .summary")),
            &format!("{scope} h2, {scope} h3"),
            &format!("{scope} p:not(.lead)"),
        )?;
        if !body.is_empty() {
            return Ok(Some(body));
        }
    }
    Ok(None)
}

fn topics(ctx: &DocumentContext<'_>) -> Result<Vec<String>, StepError> {
    for key in ["news_keywords", "keywords", "article:tag"] {
        if let Some(raw) = meta(ctx, key)? {
            return Ok(util::parse_topics(&raw));
        }
    }
    let keywords = ld_article(ctx)?.and_then(|ld| ld.get("keywords").cloned());
    Ok(match keywords {
        Some(Value::String(raw)) => util::parse_topics(&raw),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(util::parse_topics)
            .collect(),
        _ => Vec::new(),
    })
}

fn images(ctx: &DocumentContext<'_>) -> Result<Vec<Image>, StepError> {
    let mut images: Vec<Image> = Vec::new();
    if let Some(url) = meta(ctx, "og:image")? {
        images.push(Image {
            url,
            caption: None,
            alt: meta(ctx, "og:image:alt")?,
        });
    }
    if let Some(ld) = ld_article(ctx)? {
        collect_ld_images(ld.get("image"), &mut images);
    }
    Ok(images)
}

fn collect_ld_images(value: Option<&Value>, images: &mut Vec<Image>) {
    let image = match value {
        Some(Value::Array(items)) => {
            for item in items {
                collect_ld_images(Some(item), images);
            }
            return;
        }
        Some(Value::String(url)) => Image {
            url: url.clone(),
            ..Image::default()
        },
        Some(Value::Object(obj)) => {
            let url = obj
                .get("url")
                .or_else(|| obj.get("contentUrl"))
                .and_then(Value::as_str);
            let Some(url) = url else { return };
            Image {
                url: url.to_string(),
                caption: obj.get("caption").and_then(Value::as_str).map(str::to_string),
                alt: None,
            }
        }
        _ => return,
    };
    if !images.iter().any(|i| i.url == image.url) {
        images.push(image);
    }
}

fn free_access(ctx: &DocumentContext<'_>) -> Result<bool, StepError> {
    let flag = ld_article(ctx)?.and_then(|ld| ld.get("isAccessibleForFree").cloned());
    Ok(match flag {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => !s.eq_ignore_ascii_case("false"),
        _ => true,
    })
}
