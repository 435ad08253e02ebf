//! The attribute engine: runs a [`RuleSet`] over one document.
//!
//! 1. Filters run first; the first one returning `true` ends the run with
//!    [`Extraction::Filtered`] and no attribute is computed.
//! 2. Controls run next. Their side effects are assumed by later steps, so a
//!    failing control fails the whole document.
//! 3. Attributes run last, each in isolation: a failing attribute is recorded
//!    and its siblings still run.
//!
//! A cyclic context dependency is a configuration error and always fails the
//! document, whatever step hit it.

use crate::context::DocumentContext;
use crate::error::{AppError, StepError};
use crate::record::{AttributeResult, ExtractionRecord, is_empty_value};
use crate::rule_set::RuleSet;
use crate::step::{Compute, Role, Step};

/// Outcome of a successful engine run.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A filter step excluded the document.
    Filtered { filter: String },
    Extracted(ExtractionRecord),
}

impl Extraction {
    pub fn record(&self) -> Option<&ExtractionRecord> {
        match self {
            Extraction::Extracted(record) => Some(record),
            Extraction::Filtered { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<ExtractionRecord> {
        match self {
            Extraction::Extracted(record) => Some(record),
            Extraction::Filtered { .. } => None,
        }
    }
}

/// Runs `rules` over the document at `url`.
///
/// Returns `Err` for document-level failures: a failing filter or control
/// step, or a cyclic context dependency.
pub fn extract(rules: &RuleSet, url: &str, html: &str) -> Result<Extraction, AppError> {
    let ctx = DocumentContext::new(url, html, rules.providers());

    for step in rules.steps_with_role(Role::Filter) {
        let Compute::Filter(filter) = &step.compute else {
            continue;
        };
        match filter(&ctx) {
            Ok(true) => {
                tracing::debug!(%url, filter = %step.name(), "Document filtered out");
                return Ok(Extraction::Filtered {
                    filter: step.name().to_string(),
                });
            }
            Ok(false) => {}
            Err(e) => return Err(step_failure(step, e)),
        }
    }

    for step in rules.steps_with_role(Role::Control) {
        let Compute::Control(control) = &step.compute else {
            continue;
        };
        control(&ctx).map_err(|e| step_failure(step, e))?;
    }

    let mut record = ExtractionRecord::new();
    for step in rules.steps_with_role(Role::Attribute) {
        let Compute::Attribute(attribute) = &step.compute else {
            continue;
        };
        let result = match attribute(&ctx) {
            Ok(value) => {
                if step.validates() && is_empty_value(&value) {
                    record.mark_incomplete(step.name());
                }
                AttributeResult::ok(value, step.is_deprecated())
            }
            Err(StepError::CyclicDependency(key)) => {
                return Err(AppError::CyclicDependency(key));
            }
            Err(e) => {
                tracing::debug!(%url, attribute = %step.name(), error = %e, "Attribute failed");
                if step.validates() {
                    record.mark_incomplete(step.name());
                }
                AttributeResult::failed(e.to_string(), step.is_deprecated())
            }
        };
        record.insert(step.name(), result);
    }

    Ok(Extraction::Extracted(record))
}

fn step_failure(step: &Step, error: StepError) -> AppError {
    match error {
        StepError::CyclicDependency(key) => AppError::CyclicDependency(key),
        other => AppError::StepFailed {
            step: step.name().to_string(),
            role: step.role(),
            message: other.to_string(),
        },
    }
}
