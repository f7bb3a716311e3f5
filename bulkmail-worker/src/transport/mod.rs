//! Transport capability used by the dispatcher.
//!
//! A transport accepts one composed message and returns a delivery
//! identifier, or fails. Each job binds its own transport instance, so no
//! mutable connection state is shared across jobs.

pub mod smtp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub use smtp::{test_connection, SmtpConfig, SmtpTransport};

/// A fully rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// `"Name <address>"`
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// What the transport hands back for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub delivery_id: String,
}

impl DeliveryReceipt {
    pub fn new(delivery_id: impl Into<String>) -> Self {
        Self {
            delivery_id: delivery_id.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` for anything that prevented delivery.
    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, TransportError>;

    /// Check that the relay is reachable and accepts our credentials.
    async fn verify(&self) -> bool;

    /// Human label for the configuration behind this transport.
    fn label(&self) -> Option<String> {
        None
    }
}
