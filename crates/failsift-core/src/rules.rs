//! Breach rules evaluated over recorded outcome histories
//!
//! A rule is a pure predicate over a newest-first outcome history. The
//! registry maps rule names to predicates and seeds the two built-ins:
//! `percent_10` (failure ratio) and `sequence_of_5` (consecutive failures).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single recorded outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The tracked operation completed
    Success,
    /// The tracked operation failed
    Failure,
}

impl Outcome {
    /// Whether this outcome is a failure
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Failure)
    }

    /// Storage marker: non-empty token for success, empty token for failure
    pub fn as_marker(self) -> &'static str {
        match self {
            Outcome::Success => "1",
            Outcome::Failure => "",
        }
    }

    /// Parse a storage marker back into an outcome
    pub fn from_marker(marker: &str) -> Self {
        if marker.is_empty() {
            Outcome::Failure
        } else {
            Outcome::Success
        }
    }
}

/// A breach predicate over a newest-first outcome history
pub trait Rule: Send + Sync {
    /// Evaluate the rule; `true` means the history shows a significant
    /// failure pattern (a breach).
    fn evaluate(&self, history: &[Outcome]) -> bool;
}

/// Breaches when the failure ratio over the whole history reaches a
/// threshold, once a minimum number of records exists
#[derive(Debug, Clone)]
pub struct RatioRule {
    ratio: f64,
    minimum: usize,
}

impl RatioRule {
    /// Create a ratio rule with the default minimum of 10 records
    pub fn new(ratio: f64) -> Self {
        Self { ratio, minimum: 10 }
    }

    /// Create a ratio rule with an explicit minimum record count
    pub fn with_minimum(ratio: f64, minimum: usize) -> Self {
        Self { ratio, minimum }
    }
}

impl Rule for RatioRule {
    #[allow(clippy::cast_precision_loss)]
    fn evaluate(&self, history: &[Outcome]) -> bool {
        // Below the minimum the rule never breaches (cold-start protection).
        if history.len() < self.minimum {
            return false;
        }

        let failures = history.iter().filter(|o| o.is_failure()).count();
        failures as f64 / history.len() as f64 >= self.ratio
    }
}

/// Breaches when the most recent `length` outcomes are all failures
#[derive(Debug, Clone)]
pub struct SequenceRule {
    length: usize,
}

impl SequenceRule {
    /// Create a sequence rule over the `length` newest outcomes
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Rule for SequenceRule {
    fn evaluate(&self, history: &[Outcome]) -> bool {
        if history.len() < self.length {
            return false;
        }

        // History is newest-first, so the window is the front of the slice.
        history[..self.length].iter().all(|o| o.is_failure())
    }
}

/// Adapter letting a plain closure act as a rule
pub struct FnRule<F>(F);

impl<F> FnRule<F>
where
    F: Fn(&[Outcome]) -> bool + Send + Sync,
{
    /// Wrap a closure as a rule
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&[Outcome]) -> bool + Send + Sync,
{
    fn evaluate(&self, history: &[Outcome]) -> bool {
        (self.0)(history)
    }
}

/// Named rule lookup table
///
/// Defaults to the two built-ins; caller registrations take precedence,
/// including over the built-in names. Custom predicates are not validated.
pub struct RuleRegistry {
    rules: HashMap<String, Arc<dyn Rule>>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut rules: HashMap<String, Arc<dyn Rule>> = HashMap::new();
        rules.insert("percent_10".to_string(), Arc::new(RatioRule::new(0.1)));
        rules.insert("sequence_of_5".to_string(), Arc::new(SequenceRule::new(5)));
        Self { rules }
    }
}

impl RuleRegistry {
    /// Create a registry seeded with the built-in rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule under a name, replacing any existing entry
    pub fn register(&mut self, name: impl Into<String>, rule: Arc<dyn Rule>) {
        self.rules.insert(name.into(), rule);
    }

    /// Register a closure as a rule
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Outcome]) -> bool + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnRule::new(f)));
    }

    /// Look up a rule by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(name)
    }
}
