//! RabbitMQ consumer module using lapin.
//!
//! This module handles connecting to RabbitMQ, consuming dispatch requests
//! from the bulk_dispatch queue, and running each one through its own
//! dispatcher and transport on a spawned task.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use bulkmail::{
    Config, DispatchRequest, Dispatcher, EmailNotifier, JobControl, Notifier, SmtpTransport,
    TracingLog, Transport, WebhookNotifier, DISPATCH_QUEUE,
};

/// Run the RabbitMQ consumer.
///
/// This function:
/// 1. Connects to RabbitMQ using the configured URL
/// 2. Sets QoS so at most `worker_concurrency` jobs are in flight
/// 3. Declares the queue (idempotent operation)
/// 4. Starts consuming requests, spawning a task for each job
/// 5. On SIGINT/SIGTERM, cancels in-flight jobs and waits for them to settle
pub async fn run(config: Config) -> Result<()> {
    let config = Arc::new(config);

    info!(url_length = config.amqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.amqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    let channel = conn.create_channel().await.context("Failed to create channel")?;

    let prefetch_count = u16::try_from(config.worker_concurrency).unwrap_or(u16::MAX);
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    channel
        .queue_declare(
            DISPATCH_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    info!(queue = DISPATCH_QUEUE, "rabbitmq_queue_declared");

    let mut consumer = channel
        .basic_consume(
            DISPATCH_QUEUE,
            "bulkmail-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = DISPATCH_QUEUE, "rabbitmq_consumer_started");
    info!("worker_ready");

    let channel = Arc::new(channel);
    let control = JobControl::new();
    let mut jobs = JoinSet::new();

    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(in_flight = jobs.len(), "worker_stopping");
                break;
            }
            Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "dispatch_task_panicked");
                }
            }
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        info!(
                            queue = DISPATCH_QUEUE,
                            delivery_tag = delivery.delivery_tag,
                            body_length = delivery.data.len(),
                            "rabbitmq_request_received"
                        );

                        jobs.spawn(handle_delivery(
                            Arc::clone(&config),
                            Arc::clone(&channel),
                            control.clone(),
                            delivery,
                        ));
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    control.cancel();
    while let Some(joined) = jobs.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "dispatch_task_panicked");
        }
    }

    info!("worker_shutdown_complete");
    Ok(())
}

/// Parse, dispatch and acknowledge one request.
///
/// Every request that parses is acked once its job returns, whatever the
/// outcome: redelivering would resend mail to recipients already attempted.
async fn handle_delivery(
    config: Arc<Config>,
    channel: Arc<Channel>,
    control: JobControl,
    delivery: Delivery,
) {
    let delivery_tag = delivery.delivery_tag;

    let request: DispatchRequest = match serde_json::from_slice(&delivery.data) {
        Ok(request) => request,
        Err(e) => {
            error!(
                delivery_tag = delivery_tag,
                error = %e,
                body_preview = %String::from_utf8_lossy(&delivery.data[..delivery.data.len().min(500)]),
                "rabbitmq_request_parse_failed"
            );

            // Malformed requests will never parse; drop instead of requeueing.
            if let Err(e) = channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue: false,
                        ..Default::default()
                    },
                )
                .await
            {
                error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_nack_failed");
            }
            return;
        }
    };

    let dispatcher = build_dispatcher(&config, &request);

    match dispatcher.run_with_control(&request.job, &control).await {
        Ok(report) => info!(
            job_id = %report.job_id,
            state = ?report.state,
            sent = report.stats.sent,
            failed = report.stats.failed,
            total = report.stats.total,
            "worker_job_done"
        ),
        Err(e) => error!(job_id = %request.job.id, error = %e, "worker_job_aborted"),
    }

    if let Err(e) = channel
        .basic_ack(delivery_tag, BasicAckOptions::default())
        .await
    {
        error!(delivery_tag = delivery_tag, error = %e, "rabbitmq_ack_failed");
    }
}

/// Bind a fresh transport and notifier for one request.
fn build_dispatcher(config: &Config, request: &DispatchRequest) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(Arc::new(TracingLog));

    let transport: Option<Arc<dyn Transport>> =
        match request.smtp.as_ref().or(config.smtp.as_ref()) {
            Some(smtp) => match SmtpTransport::new(smtp) {
                Ok(transport) => Some(Arc::new(transport)),
                Err(e) => {
                    error!(job_id = %request.job.id, host = %smtp.host, error = %e, "smtp_transport_setup_failed");
                    None
                }
            },
            None => None,
        };

    if let Some(transport) = &transport {
        dispatcher = dispatcher.with_transport(Arc::clone(transport));
    }

    let notifier: Option<Arc<dyn Notifier>> = match &config.notify_webhook_url {
        Some(url) => match WebhookNotifier::new(
            url.clone(),
            std::time::Duration::from_millis(config.notify_timeout_ms),
        ) {
            Ok(notifier) => Some(Arc::new(notifier)),
            Err(e) => {
                warn!(error = %e, "notify_webhook_setup_failed");
                None
            }
        },
        None => transport
            .map(|transport| Arc::new(EmailNotifier::new(transport, request.job.sender())) as Arc<dyn Notifier>),
    };

    if let Some(notifier) = notifier {
        dispatcher = dispatcher.with_notifier(notifier);
    }

    dispatcher
}
