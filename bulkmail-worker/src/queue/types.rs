//! Queue message types.

use serde::{Deserialize, Serialize};

use crate::dispatch::Job;
use crate::transport::SmtpConfig;

/// Queue name for bulk dispatch requests.
pub const DISPATCH_QUEUE: &str = "bulk_dispatch";

/// One job plus the relay it should be sent through.
///
/// When `smtp` is absent the worker falls back to its environment relay; if
/// that is also absent the job is aborted without sending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub job: Job,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_request_deserialization() {
        let json = r#"{
            "job": {
                "id": "6f1c2b9e-0c1e-4c55-9a61-0f3f7a6f2d10",
                "contacts": [
                    {"Email": "ann@example.com", "FirstName": "Ann"},
                    {"Email": "bob@example.com"}
                ],
                "subject": "Hi {{FirstName}}",
                "html_content": "<p>Hello</p>",
                "from_name": "Acme",
                "from_email": "news@acme.test",
                "delay": 5,
                "notification": {"email": "owner@acme.test", "user_id": "u-1", "config_label": "Sales SMTP"}
            },
            "smtp": {"name": "Sales SMTP", "host": "smtp.acme.test", "port": 465, "secure": true, "user": "u", "pass": "p"}
        }"#;

        let request: DispatchRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.job.id.to_string(), "6f1c2b9e-0c1e-4c55-9a61-0f3f7a6f2d10");
        assert_eq!(request.job.contacts.len(), 2);
        assert_eq!(request.job.delay(), std::time::Duration::from_secs(5));
        assert_eq!(
            request.job.notification.as_ref().and_then(|n| n.config_label.as_deref()),
            Some("Sales SMTP")
        );

        let smtp = request.smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert!(smtp.secure);
    }

    #[test]
    fn test_dispatch_request_without_smtp() {
        let json = r#"{"job": {
            "contacts": [], "subject": "s", "html_content": "h",
            "from_name": "n", "from_email": "e@acme.test"
        }}"#;

        let request: DispatchRequest = serde_json::from_str(json).unwrap();
        assert!(request.smtp.is_none());
    }
}
