//! Bulkmail Worker - paced bulk email dispatch consumer.
//!
//! This worker consumes dispatch requests from the bulk_dispatch queue and
//! sends each job's mail one recipient at a time, pausing between sends,
//! logging every outcome and notifying the job owner when it completes.

mod consumer;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bulkmail::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    tracing::info!("worker_starting");

    let config = Config::from_env();
    tracing::info!(
        amqp_url_set = !config.amqp_url.is_empty(),
        concurrency = config.worker_concurrency,
        smtp_fallback = config.smtp.is_some(),
        notify_webhook = config.notify_webhook_url.is_some(),
        "config_loaded"
    );

    consumer::run(config).await?;

    Ok(())
}
