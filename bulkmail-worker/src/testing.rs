//! Test doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{DeliveryReceipt, OutgoingMessage, Transport};

/// Transport that records every message and fails the calls it was told to.
///
/// Calls are numbered from zero in arrival order; successful calls return
/// `delivery-<n>` as the delivery id.
#[derive(Default)]
pub struct ScriptedTransport {
    failures: HashMap<usize, TransportError>,
    messages: Mutex<Vec<OutgoingMessage>>,
    label: Option<String>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, call: usize, error: TransportError) -> Self {
        self.failures.insert(call, error);
        self
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, TransportError> {
        let call = {
            let mut messages = self.messages.lock().unwrap();
            messages.push(message.clone());
            messages.len() - 1
        };

        match self.failures.get(&call) {
            Some(error) => Err(error.clone()),
            None => Ok(DeliveryReceipt::new(format!("delivery-{call}"))),
        }
    }

    async fn verify(&self) -> bool {
        true
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }
}
