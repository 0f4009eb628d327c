//! Gateway frame format
//!
//! Defines the envelope shared by every frame in both directions.

use super::{HelloPayload, ResumeAckPayload, Signal};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway frame envelope
///
/// `{ "s": signal, "d": body, "sn": sequence }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Signal code
    pub s: Signal,

    /// Frame body
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub d: Value,

    /// Sequence number (application frames, and pings from the client)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sn: Option<u64>,
}

impl Envelope {
    /// Create a frame
    #[must_use]
    pub fn new(s: Signal, d: Value, sn: Option<u64>) -> Self {
        Self { s, d, sn }
    }

    // === Client Frames ===

    /// Heartbeat ping (signal 2) carrying the last received sequence number
    #[must_use]
    pub fn ping(last_sequence: u64) -> Self {
        Self::new(Signal::Ping, Value::Null, Some(last_sequence))
    }

    /// Resume request (signal 4)
    #[must_use]
    pub fn resume(last_sequence: u64) -> Self {
        Self::new(Signal::Resume, Value::Null, Some(last_sequence))
    }

    // === Parsing Server Frames ===

    /// Try to parse as a Hello payload (signal 1)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.s != Signal::Hello {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    /// Try to parse as a ResumeAck payload (signal 6)
    pub fn as_resume_ack(&self) -> Option<ResumeAckPayload> {
        if self.s != Signal::ResumeAck {
            return None;
        }
        serde_json::from_value(self.d.clone()).ok()
    }

    // === Utilities ===

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sn {
            Some(sn) => write!(f, "Envelope(s={}, sn={sn})", self.s),
            None => write!(f, "Envelope(s={})", self.s),
        }
    }
}
