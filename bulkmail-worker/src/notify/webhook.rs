//! Completion summary POSTed as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

use super::{NotificationPayload, Notifier};
use crate::error::NotifyError;

const EVENT_JOB_COMPLETED: &str = "job_completed";

#[derive(Serialize)]
struct WebhookBody<'a> {
    event: &'static str,
    owner_id: &'a str,
    owner_email: &'a str,
    #[serde(flatten)]
    payload: &'a NotificationPayload,
}

/// POSTs completion summaries to a fixed endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Url,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns `NotifyError::Http` if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_job_completion(
        &self,
        owner_id: &str,
        owner_email: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        let body = WebhookBody {
            event: EVENT_JOB_COMPLETED,
            owner_id,
            owner_email,
            payload,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        info!(
            job_id = %payload.job_id,
            owner_id = %owner_id,
            status_code = response.status().as_u16(),
            "notify_webhook_delivered"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::dispatch::JobStats;

    fn payload() -> NotificationPayload {
        NotificationPayload {
            job_id: Uuid::nil(),
            subject: "Launch".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            stats: JobStats {
                sent: 3,
                failed: 0,
                total: 3,
            },
            config_label: "Bulk Email Configuration".to_string(),
        }
    }

    #[test]
    fn test_body_flattens_payload() {
        let payload = payload();
        let body = WebhookBody {
            event: EVENT_JOB_COMPLETED,
            owner_id: "u-1",
            owner_email: "owner@acme.test",
            payload: &payload,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["event"], "job_completed");
        assert_eq!(json["owner_email"], "owner@acme.test");
        assert_eq!(json["subject"], "Launch");
        assert_eq!(json["stats"]["sent"], 3);
        assert_eq!(json["config_label"], "Bulk Email Configuration");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let url = Url::parse("http://127.0.0.1:1/hooks/bulk").unwrap();
        let notifier = WebhookNotifier::new(url, Duration::from_millis(500)).unwrap();

        let result = notifier
            .send_job_completion("u-1", "owner@acme.test", &payload())
            .await;

        assert!(matches!(result, Err(NotifyError::Http(_))));
    }
}
