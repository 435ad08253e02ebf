//! Computation steps: the unit a rule set is built from.
//!
//! A step is a named closure tagged with a [`Role`]. Filters decide whether a
//! document is skipped, controls seed the [`DocumentContext`], and attributes
//! produce one named output value each.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::context::DocumentContext;
use crate::error::StepError;

/// Role of a step. The derived ordering is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Filter,
    Control,
    Attribute,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Filter => "filter",
            Role::Control => "control",
            Role::Attribute => "attribute",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type FilterFn = Arc<dyn Fn(&DocumentContext<'_>) -> Result<bool, StepError> + Send + Sync>;
pub type ControlFn = Arc<dyn Fn(&DocumentContext<'_>) -> Result<(), StepError> + Send + Sync>;
pub type AttributeFn =
    Arc<dyn Fn(&DocumentContext<'_>) -> Result<serde_json::Value, StepError> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Compute {
    Filter(FilterFn),
    Control(ControlFn),
    Attribute(AttributeFn),
}

/// One named unit of extraction logic.
#[derive(Clone)]
pub struct Step {
    name: String,
    priority: i32,
    validate: bool,
    deprecated: bool,
    pub(crate) compute: Compute,
}

impl Step {
    /// A filter step. Returning `true` means "not a matching article".
    pub fn filter<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> Result<bool, StepError> + Send + Sync + 'static,
    {
        Self::with_compute(name, Compute::Filter(Arc::new(f)))
    }

    /// A control step that prepares the context for later steps.
    pub fn control<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> Result<(), StepError> + Send + Sync + 'static,
    {
        Self::with_compute(name, Compute::Control(Arc::new(f)))
    }

    /// An attribute step. The produced value is serialized to JSON.
    pub fn attribute<F, T>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&DocumentContext<'_>) -> Result<T, StepError> + Send + Sync + 'static,
        T: Serialize,
    {
        let compute: AttributeFn = Arc::new(move |ctx| {
            let value = f(ctx)?;
            Ok(serde_json::to_value(value)?)
        });
        Self::with_compute(name, Compute::Attribute(compute))
    }

    fn with_compute(name: impl Into<String>, compute: Compute) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            validate: true,
            deprecated: false,
            compute,
        }
    }

    /// Lower priorities run earlier within the same role.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Empty or failed results of this step do not count against completeness.
    pub fn no_validate(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        match self.compute {
            Compute::Filter(_) => Role::Filter,
            Compute::Control(_) => Role::Control,
            Compute::Attribute(_) => Role::Attribute,
        }
    }

    pub fn get_priority(&self) -> i32 {
        self.priority
    }

    pub fn validates(&self) -> bool {
        self.validate
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("role", &self.role())
            .field("priority", &self.priority)
            .field("validate", &self.validate)
            .field("deprecated", &self.deprecated)
            .finish()
    }
}
