//! Bulk dispatch engine.
//!
//! Runs one [`Job`] start to finish: renders each contact's subject and body,
//! sends through the bound [`Transport`], records one [`LogEntry`] per
//! attempt, waits the job's pacing delay between sends, and finally hands a
//! summary to the [`Notifier`] if the job asked for one.
//!
//! ## Flow
//!
//! ```text
//! Job → precondition check → for each contact: render → send → log → pace → notify
//! ```
//!
//! Sends are strictly sequential and in input order. A recipient's failure is
//! recorded and the loop moves on; only a missing transport aborts the job.

pub mod control;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DeliveryError, DispatchError, NotifyError};
use crate::notify::{resolve_config_label, NotificationPayload, NotificationTarget, Notifier};
use crate::outcome::{LogEntry, Outcome, OutcomeLog};
use crate::template::{placeholders, render};
use crate::transport::{OutgoingMessage, Transport};

pub use control::{Cancelled, ControlSignal, JobControl};
pub use types::{Contact, Job, JobReport, JobState, JobStats, EMAIL_FIELD};

/// The dispatch engine.
///
/// Holds its collaborators explicitly; bind one transport per job or per
/// configuration rather than sharing a mutable connection across jobs.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Option<Arc<dyn Transport>>,
    log: Arc<dyn OutcomeLog>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Dispatcher {
    /// Create a dispatcher with no transport or notifier bound.
    pub fn new(log: Arc<dyn OutcomeLog>) -> Self {
        Self {
            transport: None,
            log,
            notifier: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run a job to completion and return its final counts.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::TransportNotConfigured` before any send if no
    /// transport is bound. Per-recipient and notification failures never
    /// surface here.
    pub async fn run(&self, job: &Job) -> Result<JobStats, DispatchError> {
        self.run_with_control(job, &JobControl::new())
            .await
            .map(|report| report.stats)
    }

    /// Run a job under external pause/resume/cancel control.
    ///
    /// # Errors
    ///
    /// Same precondition as [`run`](Self::run).
    pub async fn run_with_control(
        &self,
        job: &Job,
        control: &JobControl,
    ) -> Result<JobReport, DispatchError> {
        info!(
            job_id = %job.id,
            state = ?JobState::Pending,
            contacts = job.contacts.len(),
            "dispatch_job_received"
        );

        let Some(transport) = self.transport.as_deref() else {
            error!(
                job_id = %job.id,
                state = ?JobState::Aborted,
                reason = "transport_not_configured",
                "dispatch_job_aborted"
            );
            return Err(DispatchError::TransportNotConfigured);
        };

        let total = job.contacts.len();
        let delay = job.delay();
        let started_at = Utc::now();
        let mut stats = JobStats::new(total);
        let mut state = JobState::Running;

        info!(
            job_id = %job.id,
            state = ?state,
            total = total,
            delay_secs = job.delay_secs,
            subject_fields = ?placeholders(&job.subject),
            body_fields = ?placeholders(&job.html_content),
            notify = job.notification.is_some(),
            "dispatch_job_start"
        );

        for (index, contact) in job.contacts.iter().enumerate() {
            if control.checkpoint().await.is_err() {
                state = JobState::Cancelled;
                break;
            }

            let entry = self.deliver(transport, job, index, contact).await;
            stats.record(&entry.outcome);
            self.log.append(entry);

            if index + 1 < total {
                info!(
                    job_id = %job.id,
                    index = index,
                    delay_secs = job.delay_secs,
                    "dispatch_pacing_wait"
                );
                if control.sleep(delay).await.is_err() {
                    state = JobState::Cancelled;
                    break;
                }
            }
        }

        if state == JobState::Running {
            state = JobState::Completed;
        }
        let finished_at = Utc::now();

        info!(
            job_id = %job.id,
            state = ?state,
            sent = stats.sent,
            failed = stats.failed,
            total = stats.total,
            "dispatch_job_finished"
        );

        if state == JobState::Completed {
            if let Some(target) = &job.notification {
                let payload = NotificationPayload {
                    job_id: job.id,
                    subject: job.subject.clone(),
                    started_at,
                    finished_at,
                    stats,
                    config_label: resolve_config_label(
                        target.config_label.as_deref(),
                        transport.label().as_deref(),
                    ),
                };
                self.notify_completion(target, &payload).await;
            }
        }

        Ok(JobReport {
            job_id: job.id,
            state,
            stats,
            started_at,
            finished_at,
        })
    }

    /// Render, compose and send to one contact. Never fails; the outcome is
    /// captured in the returned entry.
    async fn deliver(
        &self,
        transport: &dyn Transport,
        job: &Job,
        index: usize,
        contact: &Contact,
    ) -> LogEntry {
        let subject = render(&job.subject, contact);
        let timestamp = Utc::now();

        let result = match contact.email() {
            Some(to) => {
                let message = OutgoingMessage {
                    from: job.sender(),
                    to: to.to_string(),
                    subject: subject.clone(),
                    html: render(&job.html_content, contact),
                };
                transport
                    .send(&message)
                    .await
                    .map_err(DeliveryError::from)
            }
            None => Err(DeliveryError::MissingRecipient),
        };

        let recipient = contact.email().unwrap_or_default().to_string();
        let outcome = match result {
            Ok(receipt) => {
                info!(
                    job_id = %job.id,
                    index = index,
                    to = %recipient,
                    delivery_id = %receipt.delivery_id,
                    "dispatch_send_ok"
                );
                Outcome::Sent {
                    delivery_id: receipt.delivery_id,
                }
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    index = index,
                    to = %recipient,
                    error = %e,
                    "dispatch_send_failed"
                );
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        LogEntry {
            id: Uuid::new_v4(),
            job_id: job.id,
            recipient,
            timestamp,
            outcome,
            first_name: contact.first_name().map(str::to_string),
            company: contact.company().map(str::to_string),
            subject,
        }
    }

    /// Best-effort completion notice; failures are logged and dropped.
    async fn notify_completion(&self, target: &NotificationTarget, payload: &NotificationPayload) {
        let result = match &self.notifier {
            Some(notifier) => {
                notifier
                    .send_job_completion(&target.user_id, &target.email, payload)
                    .await
            }
            None => Err(NotifyError::NotConfigured),
        };

        match result {
            Ok(()) => info!(
                job_id = %payload.job_id,
                owner_id = %target.user_id,
                config_label = %payload.config_label,
                "notify_sent"
            ),
            Err(e) => warn!(
                job_id = %payload.job_id,
                owner_id = %target.user_id,
                error = %e,
                "notify_failed"
            ),
        }
    }
}
