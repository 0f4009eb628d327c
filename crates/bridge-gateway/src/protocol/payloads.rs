//! Payloads of control signals

use serde::{Deserialize, Serialize};

/// Handshake code for an expired token
pub const HANDSHAKE_TOKEN_EXPIRED: i64 = 40103;

/// Hello payload (signal 1)
///
/// Sent by the gateway right after the transport opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// `0` when the handshake was accepted
    #[serde(default)]
    pub code: i64,

    /// Session to resume on a later connection
    #[serde(default, alias = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl HelloPayload {
    /// Create an accepted handshake result
    #[must_use]
    pub fn accepted(session_id: impl Into<String>) -> Self {
        Self {
            code: 0,
            session_id: Some(session_id.into()),
        }
    }

    /// Create a rejected handshake result
    #[must_use]
    pub fn rejected(code: i64) -> Self {
        Self {
            code,
            session_id: None,
        }
    }

    /// Check if the gateway accepted the handshake
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.code == 0
    }
}

/// Resume acknowledgment payload (signal 6)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAckPayload {
    /// May differ from the session id that was resumed
    #[serde(default, alias = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
