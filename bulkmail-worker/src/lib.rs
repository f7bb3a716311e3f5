//! Bulkmail - paced bulk email dispatch.
//!
//! This library provides the dispatch engine and its collaborators for the
//! two Bulkmail binaries:
//! - `bulkmail-worker`: consumes dispatch requests and runs them
//! - `bulkmail-submit`: enqueues a request or checks SMTP connectivity
//!
//! ## Architecture
//!
//! ```text
//! Job → Dispatcher → render → Transport.send → OutcomeLog → (pace) → Notifier
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod outcome;
pub mod queue;
pub mod template;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{Contact, Dispatcher, Job, JobControl, JobReport, JobState, JobStats};
pub use error::{DeliveryError, DispatchError, NotifyError, TransportError};
pub use notify::{EmailNotifier, NotificationPayload, NotificationTarget, Notifier, WebhookNotifier};
pub use outcome::{LogEntry, MemoryLog, Outcome, OutcomeLog, TracingLog};
pub use queue::{DispatchRequest, Publisher, DISPATCH_QUEUE};
pub use template::render;
pub use transport::{test_connection, OutgoingMessage, SmtpConfig, SmtpTransport, Transport};
