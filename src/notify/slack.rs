use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{Notification, Notifier};
use crate::error::{AppError, Result};

const USERNAME: &str = "scanrun";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts run results to a Slack incoming webhook.
pub struct SlackNotifier {
    client: Client,
    url: String,
    channel: Option<String>,
    only_on_failure: bool,
}

impl SlackNotifier {
    /// `timeout` bounds the whole request, so an unresponsive webhook cannot
    /// hold up the rest of the run.
    pub fn new(
        url: &str,
        channel: Option<String>,
        only_on_failure: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| AppError::Notification(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
            channel,
            only_on_failure,
        })
    }
}

pub fn slack_payload(notification: &Notification, channel: Option<&str>) -> Value {
    let attachment = match notification {
        Notification::Summary { tests, failures } => {
            let passed = tests.saturating_sub(*failures);
            json!({
                "fallback": format!("{failures} of {tests} tests failed"),
                "color": if *failures > 0 { "danger" } else { "good" },
                "fields": [
                    { "title": "Test Failures", "value": failures.to_string(), "short": true },
                    { "title": "Successful Tests", "value": passed.to_string(), "short": true },
                ],
            })
        }
        Notification::BuildError { message } => json!({
            "fallback": "Build errors",
            "color": "danger",
            "fields": [
                { "title": "Build Errors", "value": "1", "short": true },
                { "title": "Message", "value": message, "short": false },
            ],
        }),
    };

    let mut payload = json!({
        "username": USERNAME,
        "text": "*Test Results*",
        "attachments": [attachment],
        "ts": chrono::Utc::now().timestamp(),
    });
    if let Some(channel) = channel {
        payload["channel"] = Value::String(channel.to_string());
    }
    payload
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        if self.only_on_failure && !notification.is_failure() {
            tracing::info!("Skipping Slack notification for a passing run");
            return Ok(());
        }

        let payload = slack_payload(notification, self.channel.as_deref());
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!(
                "Slack returned {status}: {body}"
            )));
        }

        tracing::info!("Successfully sent Slack notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn notifier(url: &str, only_on_failure: bool) -> SlackNotifier {
        SlackNotifier::new(url, None, only_on_failure, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_summary_payload() {
        let payload = slack_payload(
            &Notification::Summary {
                tests: 10,
                failures: 2,
            },
            Some("#ios"),
        );
        assert_eq!(payload["channel"], "#ios");
        assert_eq!(payload["attachments"][0]["color"], "danger");
        assert_eq!(payload["attachments"][0]["fields"][0]["value"], "2");
        assert_eq!(payload["attachments"][0]["fields"][1]["value"], "8");
    }

    #[test]
    fn test_passing_payload_without_channel() {
        let payload = slack_payload(
            &Notification::Summary {
                tests: 5,
                failures: 0,
            },
            None,
        );
        assert!(payload.get("channel").is_none());
        assert_eq!(payload["attachments"][0]["color"], "good");
    }

    #[tokio::test]
    async fn test_posts_to_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "username": "scanrun",
                "text": "*Test Results*",
            })))
            .with_status(200)
            .create_async()
            .await;

        let notifier = notifier(&format!("{}/hook", server.url()), false);
        notifier
            .notify(&Notification::BuildError {
                message: "Code signing is required".into(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("invalid_payload")
            .create_async()
            .await;

        let notifier = notifier(&format!("{}/hook", server.url()), false);
        let err = notifier
            .notify(&Notification::Summary {
                tests: 1,
                failures: 1,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_payload"));
    }

    #[tokio::test]
    async fn test_only_on_failure_skips_passing_runs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .expect(0)
            .create_async()
            .await;

        let notifier = notifier(&format!("{}/hook", server.url()), true);
        notifier
            .notify(&Notification::Summary {
                tests: 3,
                failures: 0,
            })
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unresponsive_webhook_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier = SlackNotifier::new(
            &format!("http://{addr}/hook"),
            None,
            false,
            Duration::from_millis(300),
        )
        .unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            notifier.notify(&Notification::Summary {
                tests: 1,
                failures: 0,
            }),
        )
        .await
        .expect("notify should give up on its own");

        assert!(matches!(result, Err(AppError::Http(_))));
    }
}
