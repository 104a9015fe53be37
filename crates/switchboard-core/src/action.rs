use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitchboardError};
use crate::step::Step;

// ---------------------------------------------------------------------------
// AggregationPolicy
// ---------------------------------------------------------------------------

/// How a sequence folds its step outcomes into one verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Stop at the first counted failure; later steps never run.
    #[default]
    FirstFailure,
    /// Attempt every step; the verdict is the AND of all counted outcomes.
    AllSteps,
}

impl AggregationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationPolicy::FirstFailure => "first_failure",
            AggregationPolicy::AllSteps => "all_steps",
        }
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AggregationPolicy {
    type Err = SwitchboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first_failure" => Ok(AggregationPolicy::FirstFailure),
            "all_steps" => Ok(AggregationPolicy::AllSteps),
            _ => Err(SwitchboardError::Config(format!(
                "invalid aggregation policy: {s}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionSequence
// ---------------------------------------------------------------------------

/// A named, ordered list of steps run in response to one discrete event.
/// Built from configuration at startup, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSequence {
    pub name: String,
    pub policy: AggregationPolicy,
    pub steps: Vec<Step>,
}

impl ActionSequence {
    pub fn new(name: impl Into<String>, policy: AggregationPolicy, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            policy,
            steps,
        }
    }
}

// ---------------------------------------------------------------------------
// ActionMap
// ---------------------------------------------------------------------------

/// What an event code is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Discrete: run this sequence.
    Run(ActionSequence),
    /// Incremental: feed the event's direction into this batch family.
    Adjust { family: String },
}

impl Binding {
    /// The bound action's name, for logs and summaries.
    pub fn target(&self) -> &str {
        match self {
            Binding::Run(seq) => &seq.name,
            Binding::Adjust { family } => family,
        }
    }
}

/// Immutable lookup from event code to binding. Codes with no entry are
/// not errors; the dispatcher ignores them.
#[derive(Debug, Default)]
pub struct ActionMap {
    bindings: HashMap<u16, Binding>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, code: u16, binding: Binding) -> Result<()> {
        if self.bindings.contains_key(&code) {
            return Err(SwitchboardError::DuplicateBinding { code });
        }
        self.bindings.insert(code, binding);
        Ok(())
    }

    pub fn resolve(&self, code: u16) -> Option<&Binding> {
        self.bindings.get(&code)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in ascending code order, for a stable startup summary.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (u16, &Binding)> {
        let mut entries: Vec<_> = self.bindings.iter().map(|(c, b)| (*c, b)).collect();
        entries.sort_by_key(|(c, _)| *c);
        entries.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
