//! Bulkmail Submit - enqueue a dispatch request or check SMTP connectivity.
//!
//! Usage:
//!
//! ```text
//! bulkmail-submit <request.json>          publish a DispatchRequest to bulk_dispatch
//! bulkmail-submit --check-smtp [smtp.json] verify a relay without sending mail
//! ```
//!
//! `--check-smtp` without a file checks the relay configured by `SMTP_HOST`.

use std::env;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bulkmail::{test_connection, Config, DispatchRequest, Publisher, SmtpConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let config = Config::from_env();
    let args: Vec<String> = env::args().skip(1).collect();

    match args.as_slice() {
        [flag] if flag == "--check-smtp" => {
            let smtp = config
                .smtp
                .context("SMTP_HOST is not set; pass an SMTP config file")?;
            check_smtp(&smtp).await
        }
        [flag, path] if flag == "--check-smtp" => {
            let smtp: SmtpConfig = read_json(Path::new(path)).await?;
            check_smtp(&smtp).await
        }
        [path] => submit(&config, Path::new(path)).await,
        _ => bail!("usage: bulkmail-submit <request.json> | --check-smtp [smtp.json]"),
    }
}

async fn check_smtp(smtp: &SmtpConfig) -> Result<()> {
    if test_connection(smtp).await {
        info!(host = %smtp.host, port = smtp.port, "smtp_check_ok");
        Ok(())
    } else {
        bail!("SMTP relay {}:{} is not reachable", smtp.host, smtp.port)
    }
}

async fn submit(config: &Config, path: &Path) -> Result<()> {
    let request: DispatchRequest = read_json(path).await?;

    if request.smtp.is_none() {
        info!(job_id = %request.job.id, "submit_without_smtp_uses_worker_fallback");
    }

    let publisher = Publisher::new(config.amqp_url.clone());
    let published = publisher.publish_request(&request).await;
    publisher.close().await;
    published?;

    info!(
        job_id = %request.job.id,
        contacts = request.job.contacts.len(),
        "submit_complete"
    );
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
