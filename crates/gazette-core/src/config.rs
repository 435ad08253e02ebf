//! Publisher registry files.
//!
//! ```json
//! {
//!   "regions": {
//!     "us": [
//!       {
//!         "name": "example-times",
//!         "domain": "https://www.example.com",
//!         "language": "en",
//!         "sources": [
//!           { "kind": "rss", "url": "https://www.example.com/rss" },
//!           { "kind": "sitemap", "url": "https://www.example.com/sitemap.xml", "reverse": true }
//!         ],
//!         "url_filter": "/(video|live)/",
//!         "rules": "generic"
//!       }
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;
use crate::filter::UrlFilter;
use crate::publisher::{Publisher, Registry, SourceSpec};
use crate::rules::{GENERIC, RuleSetCatalog};

fn default_rules() -> String {
    GENERIC.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub url_filter: Option<UrlFilter>,
    /// Name of a rule set in the catalog.
    #[serde(default = "default_rules")]
    pub rules: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub regions: BTreeMap<String, Vec<PublisherConfig>>,
}

impl RegistryConfig {
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("invalid publisher registry: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("cannot read registry '{}': {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

impl Registry {
    /// Resolves rule set names against `catalog` and validates the result.
    pub fn from_config(config: RegistryConfig, catalog: &RuleSetCatalog) -> Result<Self, AppError> {
        let mut regions = Vec::new();
        for (region, publishers) in config.regions {
            let mut resolved = Vec::with_capacity(publishers.len());
            for p in publishers {
                let rules = catalog.get(&p.rules).ok_or_else(|| {
                    AppError::ConfigError(format!(
                        "publisher '{}' refers to unknown rule set '{}'",
                        p.name, p.rules
                    ))
                })?;
                if p.sources.is_empty() {
                    tracing::warn!(publisher = %p.name, "Publisher has no sources");
                }
                resolved.push(Publisher {
                    name: p.name,
                    domain: p.domain,
                    language: p.language,
                    sources: p.sources,
                    url_filter: p.url_filter,
                    rules: rules.clone(),
                });
            }
            regions.push((region, resolved));
        }
        Registry::new(regions)
    }

    pub fn load(path: &Path, catalog: &RuleSetCatalog) -> Result<Self, AppError> {
        let registry = Self::from_config(RegistryConfig::load(path)?, catalog)?;
        tracing::debug!(path = %path.display(), publishers = registry.len(), "Loaded publisher registry");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::publisher::SourceKind;

    const REGISTRY: &str = r#"{
        "regions": {
            "us": [
                {
                    "name": "example-times",
                    "domain": "https://www.example.com",
                    "language": "en",
                    "sources": [
                        { "kind": "rss", "url": "https://www.example.com/rss" },
                        { "kind": "news_map", "url": "https://www.example.com/news.xml", "reverse": true }
                    ],
                    "url_filter": "/video/"
                }
            ],
            "de": [
                { "name": "beispiel", "domain": "https://beispiel.example", "rules": "generic",
                  "sources": [{ "kind": "sitemap", "url": "https://beispiel.example/sitemap.xml", "recursive": false }] }
            ]
        }
    }"#;

    #[test]
    fn test_load_registry_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(REGISTRY.as_bytes()).unwrap();

        let catalog = RuleSetCatalog::builtin().unwrap();
        let registry = Registry::load(file.path(), &catalog).unwrap();

        assert_eq!(registry.len(), 2);
        let times = registry.get("example-times").unwrap();
        assert_eq!(times.language.as_deref(), Some("en"));
        assert_eq!(times.source_kinds(), vec![SourceKind::Rss, SourceKind::NewsMap]);
        assert!(times.sources[1].reverse);
        assert!(times.sources[0].recursive);
        assert!(times.url_filter.as_ref().unwrap().rejects("https://www.example.com/video/1"));

        let beispiel = registry.get("beispiel").unwrap();
        assert!(!beispiel.sources[0].recursive);
    }

    #[test]
    fn test_unknown_rule_set_is_rejected() {
        let raw = r#"{"regions": {"us": [{"name": "x", "domain": "https://x.example", "rules": "bespoke"}]}}"#;
        let config = RegistryConfig::from_json(raw).unwrap();
        let err = Registry::from_config(config, &RuleSetCatalog::builtin().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(msg) if msg.contains("bespoke")));
    }

    #[test]
    fn test_invalid_json_and_missing_file() {
        assert!(matches!(
            RegistryConfig::from_json("{ not json"),
            Err(AppError::ConfigError(_))
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RegistryConfig::load(&dir.path().join("missing.json")),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_bad_url_filter_is_rejected() {
        let raw = r#"{"regions": {"us": [{"name": "x", "domain": "https://x.example", "url_filter": "("}]}}"#;
        assert!(RegistryConfig::from_json(raw).is_err());
    }
}
