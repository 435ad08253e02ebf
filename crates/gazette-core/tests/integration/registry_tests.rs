use std::io::Write;

use gazette_core::rules::RuleSetCatalog;
use gazette_core::{AppError, Registry, SourceKind};

#[test]
fn registry_file_round_trip_through_selection() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"regions": {{
            "de": [{{"name": "zeitung", "domain": "https://zeitung.example",
                     "sources": [{{"kind": "news_map", "url": "https://zeitung.example/news.xml"}}]}}],
            "fr": [{{"name": "journal", "domain": "https://journal.example",
                     "sources": [{{"kind": "rss", "url": "https://journal.example/rss"}}]}}]
        }}}}"#
    )
    .unwrap();

    let registry = Registry::load(file.path(), &RuleSetCatalog::builtin().unwrap()).unwrap();

    assert_eq!(registry.regions().collect::<Vec<_>>(), vec!["de", "fr"]);
    let selected = registry.select(&["de".to_string()], &[]).unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].source_kinds(), vec![SourceKind::NewsMap]);

    let err = registry.select(&["xx".to_string()], &[]).unwrap_err();
    assert!(matches!(err, AppError::ConfigError(_)));
}

#[test]
fn duplicate_publishers_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"regions": {{
            "a": [{{"name": "same", "domain": "https://one.example"}}],
            "b": [{{"name": "same", "domain": "https://two.example"}}]
        }}}}"#
    )
    .unwrap();

    let err = Registry::load(file.path(), &RuleSetCatalog::builtin().unwrap()).unwrap_err();
    assert!(matches!(err, AppError::ConfigError(_)));
}
