//! Application frame

use super::MessageEvent;
use crate::protocol::Envelope;
use serde_json::Value;

/// Decoded application frame (signal 0)
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationFrame {
    /// Sequence number the frame was delivered with
    pub sequence: Option<u64>,
    /// Raw frame body
    pub body: Value,
}

impl ApplicationFrame {
    #[must_use]
    pub fn new(sequence: Option<u64>, body: Value) -> Self {
        Self { sequence, body }
    }

    /// Take the body of an application envelope
    #[must_use]
    pub fn from_envelope(envelope: Envelope) -> Self {
        Self::new(envelope.sn, envelope.d)
    }

    /// Typed view of the body; `None` when the body is not a message
    #[must_use]
    pub fn message(&self) -> Option<MessageEvent> {
        serde_json::from_value(self.body.clone()).ok()
    }
}
