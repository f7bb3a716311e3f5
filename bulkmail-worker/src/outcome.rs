//! Per-recipient outcome log.
//!
//! Every attempted send produces exactly one immutable [`LogEntry`]. Sinks are
//! append-only: no deduplication, no update, no removal.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Result of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Outcome {
    /// Accepted by the transport
    Sent { delivery_id: String },
    /// Rejected, unreachable, or not attemptable
    Failed { error: String },
}

impl Outcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Outcome::Sent { .. })
    }
}

/// Audit record for one attempted send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    /// Recipient address as supplied (empty if the contact had none)
    pub recipient: String,
    /// Send attempt time
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub first_name: Option<String>,
    pub company: Option<String>,
    /// Subject as rendered for this contact, on `Failed` entries as well as
    /// `Sent` ones (never the raw template)
    pub subject: String,
}

/// Sink for log entries.
pub trait OutcomeLog: Send + Sync {
    fn append(&self, entry: LogEntry);
}

/// In-memory sink, shared by clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in append order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutcomeLog for MemoryLog {
    fn append(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Sink that emits each entry as a structured tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl OutcomeLog for TracingLog {
    fn append(&self, entry: LogEntry) {
        match &entry.outcome {
            Outcome::Sent { delivery_id } => info!(
                entry_id = %entry.id,
                job_id = %entry.job_id,
                recipient = %entry.recipient,
                timestamp = %entry.timestamp.to_rfc3339(),
                delivery_id = %delivery_id,
                first_name = ?entry.first_name,
                company = ?entry.company,
                subject = %entry.subject,
                "outcome_sent"
            ),
            Outcome::Failed { error } => warn!(
                entry_id = %entry.id,
                job_id = %entry.job_id,
                recipient = %entry.recipient,
                timestamp = %entry.timestamp.to_rfc3339(),
                error = %error,
                first_name = ?entry.first_name,
                company = ?entry.company,
                subject = %entry.subject,
                "outcome_failed"
            ),
        }
    }
}
