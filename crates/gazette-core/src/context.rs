//! Per-document cache of lazily computed intermediate values.
//!
//! A [`DocumentContext`] lives exactly as long as one extraction run. Values
//! are produced by providers registered on the rule set, computed on first
//! [`get`](DocumentContext::get) and memoized afterwards. Providers may request
//! other keys from the same context; a provider that ends up requesting its own
//! key again is reported as [`StepError::CyclicDependency`].

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use scraper::Html;
use serde_json::{Map, Value};

use crate::error::StepError;

/// Computes one context value.
pub type Provider = Arc<dyn Fn(&DocumentContext<'_>) -> Result<Value, StepError> + Send + Sync>;

/// Registered providers, keyed by context key.
pub type Providers = HashMap<String, Provider>;

enum Slot {
    Computing,
    Ready(Rc<Value>),
}

pub struct DocumentContext<'a> {
    url: &'a str,
    html: &'a str,
    providers: &'a Providers,
    tree: OnceCell<Html>,
    cache: RefCell<HashMap<String, Slot>>,
}

impl<'a> DocumentContext<'a> {
    pub fn new(url: &'a str, html: &'a str, providers: &'a Providers) -> Self {
        Self {
            url,
            html,
            providers,
            tree: OnceCell::new(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn url(&self) -> &str {
        self.url
    }

    pub fn html(&self) -> &str {
        self.html
    }

    /// The parsed document tree, parsed on first access.
    pub fn tree(&self) -> &Html {
        self.tree.get_or_init(|| Html::parse_document(self.html))
    }

    /// Returns the value for `key`, computing it on first access.
    ///
    /// Unknown keys yield an empty JSON object. Provider errors are returned
    /// to the caller and nothing is memoized for that key.
    pub fn get(&self, key: &str) -> Result<Rc<Value>, StepError> {
        match self.cache.borrow().get(key) {
            Some(Slot::Ready(value)) => return Ok(Rc::clone(value)),
            Some(Slot::Computing) => return Err(StepError::CyclicDependency(key.to_string())),
            None => {}
        }

        let Some(provider) = self.providers.get(key) else {
            return Ok(Rc::new(Value::Object(Map::new())));
        };

        self.cache
            .borrow_mut()
            .insert(key.to_string(), Slot::Computing);
        let result = provider(self);

        let mut cache = self.cache.borrow_mut();
        match result {
            Ok(value) => {
                let value = Rc::new(value);
                cache.insert(key.to_string(), Slot::Ready(Rc::clone(&value)));
                Ok(value)
            }
            Err(e) => {
                cache.remove(key);
                Err(e)
            }
        }
    }

    /// Stores a value under `key`, replacing anything computed before.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.cache
            .borrow_mut()
            .insert(key.into(), Slot::Ready(Rc::new(value)));
    }

    /// True if `key` has a value or a provider.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.cache.borrow().get(key), Some(Slot::Ready(_)))
            || self.providers.contains_key(key)
    }
}
