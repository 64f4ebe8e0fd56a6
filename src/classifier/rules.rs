use serde::Deserialize;

use super::{ClassificationRule, ERROR, PROGRESS, TESTS_EXECUTED};
use crate::error::{AppError, Result};

/// A rule as written in the config file. Exactly one matcher must be set.
#[derive(Debug, Deserialize, Clone)]
pub struct RuleConfig {
    pub label: String,
    pub prefix: Option<String>,
    pub contains: Option<String>,
    pub regex: Option<String>,
}

impl RuleConfig {
    pub fn into_rule(self) -> Result<ClassificationRule> {
        match (self.prefix, self.contains, self.regex) {
            (Some(prefix), None, None) => Ok(ClassificationRule::prefix(self.label, prefix)),
            (None, Some(needle), None) => Ok(ClassificationRule::contains(self.label, needle)),
            (None, None, Some(pattern)) => ClassificationRule::regex(self.label, &pattern),
            _ => Err(AppError::Config(format!(
                "Rule '{}' must set exactly one of prefix, contains or regex",
                self.label
            ))),
        }
    }
}

/// Rules for xcodebuild-style output.
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::contains(PROGRESS, "Touching"),
        ClassificationRule::prefix(ERROR, "error:"),
        ClassificationRule::contains(ERROR, "xcodebuild: error"),
        ClassificationRule::contains(ERROR, "** BUILD FAILED **"),
        ClassificationRule::contains(ERROR, "** TEST EXECUTE FAILED **"),
        ClassificationRule::new(TESTS_EXECUTED, |line| {
            line.trim_start().starts_with("Executed ") && line.contains(" test")
        }),
    ]
}

/// Defaults followed by the configured extra rules.
pub fn build_rules(extra: &[RuleConfig]) -> Result<Vec<ClassificationRule>> {
    let mut rules = default_rules();
    for rule in extra {
        rules.push(rule.clone().into_rule()?);
    }
    Ok(rules)
}
