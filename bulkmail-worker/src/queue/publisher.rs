//! Async RabbitMQ publisher for enqueueing dispatch requests.
//!
//! Holds one lazily opened connection and channel, reopened when the broker
//! drops them.

use std::sync::Arc;

use anyhow::{Context, Result};
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{DispatchRequest, DISPATCH_QUEUE};

/// Async RabbitMQ publisher with connection management.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl Publisher {
    /// Create a new publisher with the given RabbitMQ URL.
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("rabbitmq_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        let ch = conn
            .create_channel()
            .await
            .context("Failed to create channel")?;

        ch.queue_declare(
            DISPATCH_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare dispatch queue")?;

        info!(queue = DISPATCH_QUEUE, "rabbitmq_publisher_connected");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Publish a dispatch request to the bulk_dispatch queue.
    pub async fn publish_request(&self, request: &DispatchRequest) -> Result<()> {
        let channel = self.ensure_connected().await?;

        let body = serde_json::to_vec(request).context("Failed to serialize dispatch request")?;
        let message_id = request.job.id.to_string();

        channel
            .basic_publish(
                "",
                DISPATCH_QUEUE,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(message_id.clone().into()),
            )
            .await
            .context("Failed to publish to dispatch queue")?
            .await
            .context("Failed to confirm publish")?;

        info!(
            queue = DISPATCH_QUEUE,
            job_id = %message_id,
            contacts = request.job.contacts.len(),
            body_length = body.len(),
            "rabbitmq_dispatch_published"
        );

        Ok(())
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "rabbitmq_connection_close_error");
            }
        }

        info!("rabbitmq_publisher_closed");
    }
}
