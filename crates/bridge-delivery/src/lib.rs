//! # bridge-delivery
//!
//! Outbound delivery to the platform's message API: a FIFO drained by a
//! single worker, with pacing, bounded retries, content repair and the
//! source-to-target message correlation used to turn edits into updates.

pub mod api;
pub mod classify;
pub mod correlation;
pub mod error;
pub mod message;
pub mod queue;
pub mod splitter;

// Re-export commonly used types at crate root
pub use api::{MessageApi, SendAction, SendRequest};
pub use classify::{classify, ResponseClass};
pub use correlation::CorrelationMap;
pub use error::{DeliveryError, DeliveryResult};
pub use message::{generate_nonce, Card, MessageContent, MessageKind, OutboundMessage};
pub use queue::{Delivered, DeliveryQueue, DeliveryTicket, DeliveryWorker};
pub use splitter::ContentSplitter;
