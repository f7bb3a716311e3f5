//! SMTP transport backed by `lettre`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{DeliveryReceipt, OutgoingMessage, Transport};
use crate::error::TransportError;

fn default_port() -> u16 {
    587
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Connection settings for one SMTP relay.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Human label shown in completion notices
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Implicit TLS when true, opportunistic STARTTLS otherwise
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    /// Per-command timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            name: None,
            host: host.into(),
            port,
            secure: false,
            user: None,
            pass: None,
            timeout_ms: default_timeout_ms(),
        }
    }

    fn credentials(&self) -> Option<Credentials> {
        match (self.user.as_deref(), self.pass.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(Credentials::new(user.to_string(), pass.to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// SMTP transport with a pooled lettre client.
///
/// Built once per job from an [`SmtpConfig`]; never shared between jobs.
pub struct SmtpTransport {
    label: Option<String>,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Build a transport for the given relay.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if TLS parameters or the relay builder fail.
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let mut builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| TransportError::Tls(e.to_string()))?
        } else {
            let tls_parameters = TlsParameters::new(config.host.clone())
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .tls(Tls::Opportunistic(tls_parameters))
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_millis(config.timeout_ms)));

        if let Some(credentials) = config.credentials() {
            builder = builder.credentials(credentials);
        }

        Ok(Self {
            label: config.name.clone(),
            mailer: builder.build(),
        })
    }

    fn build_message(message: &OutgoingMessage, message_id: &str) -> Result<Message, TransportError> {
        let from = parse_mailbox(&message.from)?;
        let to = parse_mailbox(&message.to)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .message_id(Some(message_id.to_string()))
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| TransportError::Compose(e.to_string()))
    }
}

/// Parse `"Name <address>"` or a bare address.
///
/// An unquoted display name holding specials (`Acme, Inc. <news@acme.test>`)
/// is not valid RFC 5322, so it is split at the last `<` and rebuilt with the
/// name set explicitly; lettre quotes it on output.
fn parse_mailbox(raw: &str) -> Result<Mailbox, TransportError> {
    if let Ok(mailbox) = raw.parse::<Mailbox>() {
        return Ok(mailbox);
    }

    let invalid = || TransportError::InvalidAddress(raw.to_string());
    let (name, rest) = raw.rsplit_once('<').ok_or_else(invalid)?;
    let address: Address = rest
        .trim()
        .strip_suffix('>')
        .ok_or_else(invalid)?
        .trim()
        .parse()
        .map_err(|_| invalid())?;

    let name = name.trim();
    Ok(Mailbox::new(
        (!name.is_empty()).then(|| name.to_string()),
        address,
    ))
}

/// Generate a `Message-ID` scoped to the sender's domain.
fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, rest)| rest.trim_end_matches('>').trim())
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");

    format!("<{}@{}>", Uuid::new_v4(), domain)
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, TransportError> {
        let message_id = generate_message_id(&message.from);
        let email = Self::build_message(message, &message_id)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| TransportError::smtp(e.to_string()))?;

        info!(to = %message.to, message_id = %message_id, "smtp_message_accepted");

        Ok(DeliveryReceipt::new(message_id))
    }

    async fn verify(&self) -> bool {
        match self.mailer.test_connection().await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(error = %e, "smtp_verify_failed");
                false
            }
        }
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }
}

/// Check that a relay is reachable without sending mail.
///
/// Never errors; any failure is logged and reported as `false`.
pub async fn test_connection(config: &SmtpConfig) -> bool {
    info!(host = %config.host, port = config.port, secure = config.secure, "smtp_connection_test_start");

    let connected = match SmtpTransport::new(config) {
        Ok(transport) => transport.verify().await,
        Err(e) => {
            warn!(host = %config.host, error = %e, "smtp_connection_test_setup_failed");
            false
        }
    };

    info!(host = %config.host, connected = connected, "smtp_connection_test_complete");
    connected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(from: &str, to: &str) -> OutgoingMessage {
        OutgoingMessage {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Hello Ann".to_string(),
            html: "<p>Hi</p>".to_string(),
        }
    }

    #[test]
    fn test_build_message_with_display_name() {
        let result = SmtpTransport::build_message(
            &message("Acme News <news@acme.test>", "ann@example.com"),
            "<id@acme.test>",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_message_with_comma_in_display_name() {
        let result = SmtpTransport::build_message(
            &message("Acme, Inc. <news@acme.test>", "ann@example.com"),
            "<id@acme.test>",
        );
        assert!(result.is_ok());

        let result = SmtpTransport::build_message(
            &message(r#""Acme, Inc." <news@acme.test>"#, "ann@example.com"),
            "<id@acme.test>",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_mailbox_keeps_unquoted_name() {
        let mailbox = parse_mailbox("Acme, Inc. <news@acme.test>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Acme, Inc."));
        assert_eq!(mailbox.email.to_string(), "news@acme.test");

        let mailbox = parse_mailbox(r#""Acme, Inc." <news@acme.test>"#).unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Acme, Inc."));

        assert_eq!(
            parse_mailbox("Acme, Inc. <not an address>").unwrap_err(),
            TransportError::InvalidAddress("Acme, Inc. <not an address>".to_string())
        );
    }

    #[test]
    fn test_build_message_invalid_recipient() {
        let result = SmtpTransport::build_message(
            &message("Acme <news@acme.test>", "not an address"),
            "<id@acme.test>",
        );
        assert_eq!(
            result.unwrap_err(),
            TransportError::InvalidAddress("not an address".to_string())
        );
    }

    #[test]
    fn test_generate_message_id_uses_sender_domain() {
        let id = generate_message_id("Acme <news@acme.test>");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@acme.test>"));
        assert_ne!(id, generate_message_id("Acme <news@acme.test>"));
    }

    #[test]
    fn test_generate_message_id_without_domain() {
        assert!(generate_message_id("nobody").ends_with("@localhost>"));
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let config: SmtpConfig = serde_json::from_str(r#"{"host": "smtp.example.com"}"#).unwrap();
        assert_eq!(config.port, 587);
        assert!(!config.secure);
        assert!(config.credentials().is_none());
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let mut config = SmtpConfig::new("smtp.example.com", 465);
        config.pass = Some("hunter2".to_string());
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    // The pooled client needs a runtime to spawn into when it is dropped.
    #[tokio::test]
    async fn test_transport_builds_without_connecting() {
        let mut config = SmtpConfig::new("smtp.example.com", 465);
        config.secure = true;
        config.name = Some("Marketing relay".to_string());
        let transport = SmtpTransport::new(&config).unwrap();
        assert_eq!(transport.label(), Some("Marketing relay".to_string()));
    }

    #[tokio::test]
    async fn test_connection_unreachable_host_is_false() {
        let mut config = SmtpConfig::new("127.0.0.1", 1);
        config.timeout_ms = 500;
        assert!(!test_connection(&config).await);
    }
}
