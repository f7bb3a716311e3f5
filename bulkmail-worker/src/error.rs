//! Error taxonomy for the dispatch engine.
//!
//! Three kinds of failure are kept apart so the dispatch loop can branch on
//! kind rather than on message text:
//! - [`DispatchError`]: fatal setup problems, returned to the caller before any send
//! - [`DeliveryError`]: one recipient's failure, captured into a `Failed` log entry
//! - [`NotifyError`]: completion notice failure, logged and dropped

use thiserror::Error;

/// Fatal errors that abort a job before the dispatch loop starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No transport capability was bound to the dispatcher.
    #[error("email transport not configured")]
    TransportNotConfigured,
}

/// Errors raised by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// A sender or recipient address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The message could not be assembled.
    #[error("failed to compose message: {0}")]
    Compose(String),

    /// TLS parameters could not be built for the relay host.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The SMTP exchange failed (connection, authentication, rejection).
    #[error("SMTP error: {0}")]
    Smtp(String),
}

impl TransportError {
    pub fn smtp(message: impl Into<String>) -> Self {
        Self::Smtp(message.into())
    }
}

/// Per-recipient delivery failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The contact has no usable `Email` field.
    #[error("contact has no Email address")]
    MissingRecipient,

    /// The transport refused or failed the send.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Completion notification failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Notice could not be mailed.
    #[error("notification email failed: {0}")]
    Transport(#[from] TransportError),

    /// Webhook request failed or returned a non-success status.
    #[error("notification webhook failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A notification target was requested but no notifier is bound.
    #[error("notifier not configured")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_is_transparent_over_transport() {
        let err = DeliveryError::from(TransportError::smtp("550 mailbox unavailable"));
        assert_eq!(err.to_string(), "SMTP error: 550 mailbox unavailable");
    }

    #[test]
    fn test_missing_recipient_message() {
        assert_eq!(
            DeliveryError::MissingRecipient.to_string(),
            "contact has no Email address"
        );
    }
}
