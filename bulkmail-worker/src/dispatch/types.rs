//! Job and result types for the dispatch engine.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::notify::NotificationTarget;
use crate::outcome::Outcome;

/// Field holding the recipient address.
pub const EMAIL_FIELD: &str = "Email";

/// One recipient's field set, keyed by field name.
///
/// Lookups are exact and case-sensitive. Every field other than `Email` is
/// only used for placeholder substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contact {
    fields: HashMap<String, String>,
}

impl Contact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Recipient address, if present and non-blank.
    pub fn email(&self) -> Option<&str> {
        self.get(EMAIL_FIELD)
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn first_name(&self) -> Option<&str> {
        self.get("FirstName")
    }

    pub fn company(&self) -> Option<&str> {
        self.get("Company")
    }
}

impl<K, V> FromIterator<(K, V)> for Contact
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One bulk-send request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier, generated when the request omits it
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Recipients, sent to in this exact order
    pub contacts: Vec<Contact>,
    /// Subject template
    pub subject: String,
    /// HTML body template
    pub html_content: String,
    /// Sender display name
    pub from_name: String,
    /// Sender address
    pub from_email: String,
    /// Pause between consecutive sends, in seconds; fractions allowed
    #[serde(default, rename = "delay", deserialize_with = "deserialize_delay")]
    pub delay_secs: f64,
    /// Who to tell when the job completes
    #[serde(default)]
    pub notification: Option<NotificationTarget>,
}

fn deserialize_delay<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(de::Error::custom(format!(
            "delay must be a non-negative number of seconds, got {secs}"
        )))
    }
}

/// Characters allowed in an unquoted display name besides letters, digits
/// and spaces.
const PHRASE_SAFE: &str = "!#$%&'*+-/=?^_`{|}~.";

impl Job {
    /// Pacing delay. Negative or non-finite values set in code count as zero.
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_secs).unwrap_or(Duration::ZERO)
    }

    /// The `From` header value, `"Name <address>"`.
    ///
    /// Names containing specials such as `,` or `@` are emitted as a quoted
    /// string; a blank name yields the bare address.
    pub fn sender(&self) -> String {
        let name = self.from_name.trim();
        if name.is_empty() {
            return self.from_email.clone();
        }

        let plain = name
            .chars()
            .all(|c| c.is_alphanumeric() || c == ' ' || PHRASE_SAFE.contains(c));
        if plain {
            format!("{name} <{}>", self.from_email)
        } else {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\" <{}>", self.from_email)
        }
    }
}

/// Running counts for one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

impl JobStats {
    pub fn new(total: usize) -> Self {
        Self {
            sent: 0,
            failed: 0,
            total,
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Sent { .. } => self.sent += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }

    /// Percentage of contacts that were sent, `0.0` for an empty job.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.sent as f64 * 100.0 / self.total as f64
    }
}

/// Lifecycle of a job inside the dispatcher.
///
/// `Pending → Running → {Completed | Cancelled}`, or `Pending → Aborted`
/// when the precondition check fails. A [`JobReport`] is only produced for
/// jobs that reached `Running`. Per-recipient failures never move a
/// job out of `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Aborted,
}

/// Final account of a job that entered `Running`.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub state: JobState,
    pub stats: JobStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
