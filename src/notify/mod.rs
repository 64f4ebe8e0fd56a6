pub mod slack;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SlackConfig;
use crate::error::Result;

pub use slack::SlackNotifier;

/// What gets sent to the outside world about a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Final summary, sent once per run.
    Summary { tests: u32, failures: u32 },
    /// The tool failed to build or launch the tests.
    BuildError { message: String },
}

impl Notification {
    pub fn is_failure(&self) -> bool {
        match self {
            Notification::Summary { failures, .. } => *failures > 0,
            Notification::BuildError { .. } => true,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Notifier used when no external channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        match notification {
            Notification::Summary { tests, failures } => {
                tracing::info!(tests, failures, "Run summary (no notification channel configured)");
            }
            Notification::BuildError { message } => {
                tracing::info!(message = %message, "Build error (no notification channel configured)");
            }
        }
        Ok(())
    }
}

pub fn notifier_from_config(config: &SlackConfig) -> Result<Arc<dyn Notifier>> {
    match (&config.url, config.skip) {
        (Some(url), false) => Ok(Arc::new(SlackNotifier::new(
            url,
            config.channel.clone(),
            config.only_on_failure,
            Duration::from_secs(config.timeout_secs.max(1)),
        )?)),
        _ => {
            tracing::debug!("Slack notifications disabled");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        assert!(!Notification::Summary { tests: 5, failures: 0 }.is_failure());
        assert!(Notification::Summary { tests: 5, failures: 1 }.is_failure());
        assert!(Notification::BuildError {
            message: "boom".into()
        }
        .is_failure());
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(Notification::Summary {
            tests: 10,
            failures: 2,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"kind": "summary", "tests": 10, "failures": 2})
        );
    }

    #[test]
    fn test_notifier_from_config() {
        assert!(notifier_from_config(&SlackConfig::default()).is_ok());

        let config = SlackConfig {
            url: Some("https://hooks.slack.com/services/T000/B000/XXX".into()),
            ..SlackConfig::default()
        };
        assert!(notifier_from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let n = LogNotifier;
        assert!(n
            .notify(&Notification::BuildError {
                message: "x".into()
            })
            .await
            .is_ok());
    }
}
