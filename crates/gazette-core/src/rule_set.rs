//! Rule sets and their date-bounded versions.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use crate::context::{DocumentContext, Provider, Providers};
use crate::error::{AppError, StepError};
use crate::step::{Role, Step};
use crate::util;

/// Context key holding all `<meta>` tags of the page.
pub const META_TAGS: &str = "meta-tags";
/// Context key holding every JSON-LD object of the page.
pub const LD_JSON: &str = "ld-json";

/// An ordered collection of computation steps plus the context providers
/// they rely on.
///
/// Steps are kept sorted by role, then priority; equal priorities keep their
/// declaration order.
#[derive(Clone)]
pub struct RuleSet {
    steps: Vec<Step>,
    providers: Providers,
}

impl RuleSet {
    /// Builds a rule set, rejecting duplicate step names.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Result<Self, AppError> {
        let mut steps: Vec<Step> = steps.into_iter().collect();

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.name().to_string()) {
                return Err(AppError::ConfigError(format!(
                    "duplicate step name '{}'",
                    step.name()
                )));
            }
        }

        steps.sort_by_key(|s| (s.role(), s.get_priority()));

        Ok(Self {
            steps,
            providers: standard_providers(),
        })
    }

    /// Registers (or replaces) the provider for a context key.
    pub fn with_provider<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        self.providers.insert(key.into(), provider(f));
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn steps_with_role(&self, role: Role) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.role() == role)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.steps_with_role(Role::Attribute).map(Step::name)
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.providers.keys().collect();
        keys.sort();
        f.debug_struct("RuleSet")
            .field("steps", &self.steps)
            .field("providers", &keys)
            .finish()
    }
}

fn provider<F>(f: F) -> Provider
where
    F: Fn(&DocumentContext<'_>) -> Result<Value, StepError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn standard_providers() -> Providers {
    let mut providers = Providers::new();
    providers.insert(
        META_TAGS.to_string(),
        provider(|ctx| Ok(Value::Object(util::meta_tags(ctx.tree())))),
    );
    providers.insert(
        LD_JSON.to_string(),
        provider(|ctx| Ok(Value::Array(util::ld_json(ctx.tree())))),
    );
    providers
}

/// A rule set together with the half-open date window `[valid_from, valid_until)`
/// in which it applies. `None` leaves that side unbounded.
#[derive(Debug, Clone)]
pub struct RuleSetVersion {
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub rules: Arc<RuleSet>,
}

impl RuleSetVersion {
    /// A version valid for all dates.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            valid_from: None,
            valid_until: None,
            rules: Arc::new(rules),
        }
    }

    pub fn valid_from(mut self, date: NaiveDate) -> Self {
        self.valid_from = Some(date);
        self
    }

    pub fn valid_until(mut self, date: NaiveDate) -> Self {
        self.valid_until = Some(date);
        self
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.valid_from.is_none_or(|from| from <= date)
            && self.valid_until.is_none_or(|until| date < until)
    }
}

/// All versions of a publisher's rule set, with contiguous, non-overlapping windows.
#[derive(Debug, Clone)]
pub struct VersionedRuleSet {
    versions: Vec<RuleSetVersion>,
}

impl VersionedRuleSet {
    pub fn new(versions: impl IntoIterator<Item = RuleSetVersion>) -> Result<Self, AppError> {
        let mut versions: Vec<RuleSetVersion> = versions.into_iter().collect();
        if versions.is_empty() {
            return Err(AppError::ConfigError(
                "a publisher needs at least one rule set version".into(),
            ));
        }

        // `None` sorts first, i.e. the open-start version leads.
        versions.sort_by_key(|v| v.valid_from);

        let last = versions.len() - 1;
        for (i, version) in versions.iter().enumerate() {
            if let (Some(from), Some(until)) = (version.valid_from, version.valid_until) {
                if from >= until {
                    return Err(AppError::ConfigError(format!(
                        "empty validity window [{from}, {until})"
                    )));
                }
            }
            if i > 0 && version.valid_from.is_none() {
                return Err(AppError::ConfigError(
                    "only the earliest rule set version may have an open start".into(),
                ));
            }
            if i < last && version.valid_until.is_none() {
                return Err(AppError::ConfigError(
                    "only the latest rule set version may have an open end".into(),
                ));
            }
            if i < last && version.valid_until != versions[i + 1].valid_from {
                return Err(AppError::ConfigError(format!(
                    "rule set windows are not contiguous: {:?} is followed by {:?}",
                    version.valid_until,
                    versions[i + 1].valid_from
                )));
            }
        }

        Ok(Self { versions })
    }

    /// A single version valid for all dates.
    pub fn single(rules: RuleSet) -> Self {
        Self {
            versions: vec![RuleSetVersion::new(rules)],
        }
    }

    /// Picks the version for a reference date.
    ///
    /// Without a date the latest version is used. Dates outside every window
    /// fall back to the nearest one.
    pub fn select(&self, date: Option<NaiveDate>) -> &Arc<RuleSet> {
        let latest = &self.versions[self.versions.len() - 1];
        let Some(date) = date else {
            return &latest.rules;
        };

        if let Some(version) = self.versions.iter().find(|v| v.contains(date)) {
            return &version.rules;
        }

        let earliest = &self.versions[0];
        match earliest.valid_from {
            Some(from) if date < from => &earliest.rules,
            _ => &latest.rules,
        }
    }

    pub fn latest(&self) -> &Arc<RuleSet> {
        self.select(None)
    }

    pub fn versions(&self) -> &[RuleSetVersion] {
        &self.versions
    }
}
