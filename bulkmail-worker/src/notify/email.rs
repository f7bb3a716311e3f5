//! Completion summary delivered by mail.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{NotificationPayload, Notifier};
use crate::error::NotifyError;
use crate::transport::{OutgoingMessage, Transport};

/// Mails the completion summary through a [`Transport`].
pub struct EmailNotifier {
    transport: Arc<dyn Transport>,
    from: String,
}

impl EmailNotifier {
    /// `from` is the full `From` header value, e.g. `"Acme <news@acme.test>"`.
    pub fn new(transport: Arc<dyn Transport>, from: impl Into<String>) -> Self {
        Self {
            transport,
            from: from.into(),
        }
    }

    fn compose(&self, owner_email: &str, payload: &NotificationPayload) -> OutgoingMessage {
        let stats = &payload.stats;
        let subject = format!(
            "Bulk email job completed: {} ({}/{} sent)",
            payload.subject, stats.sent, stats.total
        );

        let html = format!(
            "<h2>Bulk email job completed</h2>\
             <table>\
             <tr><td>Subject</td><td>{subject}</td></tr>\
             <tr><td>Configuration</td><td>{config}</td></tr>\
             <tr><td>Sent</td><td>{sent}</td></tr>\
             <tr><td>Failed</td><td>{failed}</td></tr>\
             <tr><td>Total</td><td>{total}</td></tr>\
             <tr><td>Success rate</td><td>{rate:.1}%</td></tr>\
             <tr><td>Started</td><td>{started}</td></tr>\
             <tr><td>Finished</td><td>{finished}</td></tr>\
             </table>\
             <p>Job {job_id}</p>",
            subject = escape_html(&payload.subject),
            config = escape_html(&payload.config_label),
            sent = stats.sent,
            failed = stats.failed,
            total = stats.total,
            rate = stats.success_rate(),
            started = payload.started_at.to_rfc3339(),
            finished = payload.finished_at.to_rfc3339(),
            job_id = payload.job_id,
        );

        OutgoingMessage {
            from: self.from.clone(),
            to: owner_email.to_string(),
            subject,
            html,
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send_job_completion(
        &self,
        owner_id: &str,
        owner_email: &str,
        payload: &NotificationPayload,
    ) -> Result<(), NotifyError> {
        let message = self.compose(owner_email, payload);
        let receipt = self.transport.send(&message).await?;

        info!(
            job_id = %payload.job_id,
            owner_id = %owner_id,
            delivery_id = %receipt.delivery_id,
            "notify_email_sent"
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
    use crate::error::TransportError;
    use crate::testing::ScriptedTransport;

    fn payload() -> NotificationPayload {
        NotificationPayload {
            job_id: Uuid::new_v4(),
            subject: "Spring <sale>".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            stats: JobStats {
                sent: 2,
                failed: 1,
                total: 3,
            },
            config_label: "Marketing relay".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sends_summary_to_owner() {
        let transport = Arc::new(ScriptedTransport::new());
        let notifier = EmailNotifier::new(transport.clone(), "Acme <news@acme.test>");

        notifier
            .send_job_completion("u-1", "owner@acme.test", &payload())
            .await
            .unwrap();

        let sent = transport.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@acme.test");
        assert_eq!(sent[0].from, "Acme <news@acme.test>");
        assert_eq!(sent[0].subject, "Bulk email job completed: Spring <sale> (2/3 sent)");
        assert!(sent[0].html.contains("Spring &lt;sale&gt;"));
        assert!(sent[0].html.contains("Marketing relay"));
        assert!(sent[0].html.contains("66.7%"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let transport = Arc::new(ScriptedTransport::new().fail_on(0, TransportError::smtp("421 try later")));
        let notifier = EmailNotifier::new(transport, "Acme <news@acme.test>");

        let result = notifier
            .send_job_completion("u-1", "owner@acme.test", &payload())
            .await;

        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}
