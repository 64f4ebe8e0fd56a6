use serde::Serialize;
use thiserror::Error;

use super::types::StreamError;

/// A build or tool failure that kept the tests from producing a result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum BuildError {
    #[error("Your shell environment uses US-ASCII instead of UTF-8; set LC_ALL and LANG to en_US.UTF-8")]
    Encoding,

    #[error("Code signing error: {0}")]
    CodeSigning(String),

    #[error("Error building/testing the application: {0}")]
    BuildFailed(String),
}

/// Decides whether captured error output is a real build failure.
pub trait BuildErrorHandler: Send + Sync {
    /// `Ok` means the error is explained by the test report and needs no escalation.
    fn handle(&self, error: &StreamError) -> std::result::Result<(), BuildError>;
}

/// Matches well-known xcodebuild failure texts. Checks run in a fixed order:
/// locale problems and signing failures win over "tests were executed".
pub struct PatternErrorHandler;

impl BuildErrorHandler for PatternErrorHandler {
    fn handle(&self, error: &StreamError) -> std::result::Result<(), BuildError> {
        let text = error.text();

        if text.contains("US-ASCII") || text.contains("invalid byte sequence") {
            return Err(BuildError::Encoding);
        }

        if let Some(line) = text
            .lines()
            .find(|l| l.contains("Code Sign error") || l.contains("code signing is required"))
        {
            return Err(BuildError::CodeSigning(line.trim().to_string()));
        }

        if error.tests_executed || text.contains("Executed") {
            tracing::debug!("Tests were executed, deferring to the test report");
            return Ok(());
        }

        let summary = error
            .first_error_line()
            .unwrap_or("see the log above")
            .trim()
            .to_string();
        Err(BuildError::BuildFailed(summary))
    }
}
