use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one attribute step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeResult {
    pub value: Option<Value>,
    #[serde(default)]
    pub deprecated: bool,
    /// Error message if the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttributeResult {
    pub fn ok(value: Value, deprecated: bool) -> Self {
        Self {
            value: Some(value),
            deprecated,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, deprecated: bool) -> Self {
        Self {
            value: None,
            deprecated,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True if the value is absent or an empty string, list or object.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().is_none_or(is_empty_value)
    }
}

pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Result of running a rule set's attribute steps over one document.
///
/// Holds exactly one entry per attribute step, whether it succeeded or not,
/// plus the names of validated attributes that came back empty or failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    attributes: BTreeMap<String, AttributeResult>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    incomplete: BTreeSet<String>,
}

impl ExtractionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, result: AttributeResult) {
        self.attributes.insert(name.into(), result);
    }

    pub(crate) fn mark_incomplete(&mut self, name: impl Into<String>) {
        self.incomplete.insert(name.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttributeResult> {
        self.attributes.get(name)
    }

    /// The produced value, if the attribute exists and succeeded.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).and_then(|r| r.value.as_ref())
    }

    /// Deserializes an attribute into `T`; `None` when absent or mistyped.
    pub fn typed<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.value(name)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(attribute = %name, error = %e, "Attribute has unexpected shape");
                None
            }
        }
    }

    /// True if the attribute exists, succeeded, and is non-empty.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|r| !r.is_error() && !r.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeResult)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Names of attributes whose step failed.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter_map(|(k, v)| v.error.as_deref().map(|e| (k.as_str(), e)))
    }

    /// Validated attributes that were empty or failed.
    pub fn incomplete(&self) -> &BTreeSet<String> {
        &self.incomplete
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
