//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The dispatch request message type
//! - Async publisher for enqueueing requests
//!
//! ## Architecture
//!
//! ```text
//! bulkmail-submit → bulk_dispatch queue → bulkmail-worker → Dispatcher
//! ```

pub mod publisher;
pub mod types;

pub use publisher::Publisher;
pub use types::{DispatchRequest, DISPATCH_QUEUE};
