//! Completion notification.
//!
//! After a job completes, the dispatcher optionally sends one summary to the
//! job's owner. Delivery is best-effort: failures are logged by the caller and
//! never change the job's outcome.

pub mod email;
pub mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::JobStats;
use crate::error::NotifyError;

pub use email::EmailNotifier;
pub use webhook::WebhookNotifier;

/// Label used when neither the job nor the transport names its configuration.
pub const DEFAULT_CONFIG_LABEL: &str = "Bulk Email Configuration";

/// Who to notify when a job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    /// Owner's address
    pub email: String,
    /// Owner's opaque identity
    pub user_id: String,
    /// Label of the transport configuration used for the job
    #[serde(default)]
    pub config_label: Option<String>,
}

/// Summary of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub job_id: Uuid,
    pub subject: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: JobStats,
    pub config_label: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a completion summary to the job owner.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the summary could not be delivered.
    async fn send_job_completion(
        &self,
        owner_id: &str,
        owner_email: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError>;
}

/// Pick the configuration label shown in the summary.
pub fn resolve_config_label(target: Option<&str>, transport: Option<&str>) -> String {
    target
        .filter(|label| !label.is_empty())
        .or(transport.filter(|label| !label.is_empty()))
        .unwrap_or(DEFAULT_CONFIG_LABEL)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_label_precedence() {
        assert_eq!(resolve_config_label(Some("Sales SMTP"), Some("relay")), "Sales SMTP");
        assert_eq!(resolve_config_label(None, Some("relay")), "relay");
        assert_eq!(resolve_config_label(Some(""), None), DEFAULT_CONFIG_LABEL);
        assert_eq!(resolve_config_label(None, None), DEFAULT_CONFIG_LABEL);
    }

    #[test]
    fn test_notification_target_label_optional() {
        let target: NotificationTarget =
            serde_json::from_str(r#"{"email": "owner@acme.test", "user_id": "u-1"}"#).unwrap();
        assert_eq!(target.config_label, None);
    }
}
