//! Resumable session
//!
//! `{ sessionId, sn }`, persisted after every accepted frame.

use serde::{Deserialize, Serialize};

/// Logical gateway session
///
/// The sequence number only moves forward while the session lives; a reset
/// returns it to `("", 0)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Empty when there is nothing to resume
    #[serde(default, rename = "sessionId")]
    pub session_id: String,

    /// Last accepted sequence number
    #[serde(default, rename = "sn", alias = "sequenceNumber")]
    pub sequence: u64,
}

impl Session {
    /// Create a session
    #[must_use]
    pub fn new(session_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            session_id: session_id.into(),
            sequence,
        }
    }

    /// Check if a connection attempt should resume this session
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        !self.session_id.is_empty()
    }

    /// Record the sequence number of an inbound frame.
    ///
    /// Returns `false` when the frame is a replay (not newer than the stored
    /// sequence); the stored value is left untouched in that case.
    pub fn accept_sequence(&mut self, sn: Option<u64>) -> bool {
        match sn {
            None => true,
            Some(sn) if sn > self.sequence => {
                self.sequence = sn;
                true
            }
            Some(_) => false,
        }
    }

    /// Store the session id handed out by the gateway
    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
    }

    /// Forget the session so the next connection performs a clean handshake
    pub fn reset(&mut self) {
        self.session_id.clear();
        self.sequence = 0;
    }
}
