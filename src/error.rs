use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build error: {0}")]
    StreamBuild(String),

    #[error("Test execution failed. Exit status: {exit_code}")]
    ExecutionFailure { exit_code: i32 },

    #[error("Tests have failed ({failures} failures)")]
    TestFailure { failures: u32 },

    #[error("Test report unavailable: {0}")]
    ReportUnavailable(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Cleanup failed: {0}")]
    Cleanup(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Invalid classification rule: {0}")]
    Rule(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error should terminate the invocation with a failure signal.
    pub fn is_user_fatal(&self) -> bool {
        matches!(
            self,
            AppError::TestFailure { .. } | AppError::ExecutionFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_test_and_execution_failures_are_fatal() {
        assert!(AppError::TestFailure { failures: 2 }.is_user_fatal());
        assert!(AppError::ExecutionFailure { exit_code: 65 }.is_user_fatal());
        assert!(!AppError::Notification("timeout".into()).is_user_fatal());
        assert!(!AppError::Cleanup("no logs".into()).is_user_fatal());
        assert!(!AppError::ReportUnavailable("missing".into()).is_user_fatal());
        assert!(!AppError::StreamBuild("boom".into()).is_user_fatal());
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let tests = AppError::TestFailure { failures: 2 }.to_string();
        let exec = AppError::ExecutionFailure { exit_code: 65 }.to_string();
        assert!(tests.contains("2 failures"));
        assert!(exec.contains("Exit status: 65"));
        assert_ne!(tests, exec);
    }
}
