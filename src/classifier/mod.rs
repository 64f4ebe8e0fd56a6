//! Line-by-line tagging of streamed process output.
//!
//! Every rule is checked against every line and all matching labels are
//! returned. Rules never look past the current line.

pub mod rules;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

pub use rules::{default_rules, RuleConfig};

/// Heartbeat label driving the loading indicator. Presentation only.
pub const PROGRESS: &str = "progress";
/// Build or tool level error, distinct from a failing test.
pub const ERROR: &str = "error";
/// The tool reported that tests actually ran.
pub const TESTS_EXECUTED: &str = "tests-executed";

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A labelled line predicate.
#[derive(Clone)]
pub struct ClassificationRule {
    label: String,
    predicate: Predicate,
}

impl ClassificationRule {
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn prefix(label: impl Into<String>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(label, move |line| line.starts_with(prefix.as_str()))
    }

    pub fn contains(label: impl Into<String>, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::new(label, move |line| line.contains(needle.as_str()))
    }

    pub fn regex(label: impl Into<String>, pattern: &str) -> crate::error::Result<Self> {
        let re = Regex::new(pattern)?;
        Ok(Self::new(label, move |line| re.is_match(line)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, line: &str) -> bool {
        (self.predicate)(line)
    }
}

impl fmt::Debug for ClassificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationRule")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Labels of all rules whose predicate matches `line`.
pub fn classify(line: &str, rules: &[ClassificationRule]) -> BTreeSet<String> {
    rules
        .iter()
        .filter(|rule| rule.matches(line))
        .map(|rule| rule.label.clone())
        .collect()
}
