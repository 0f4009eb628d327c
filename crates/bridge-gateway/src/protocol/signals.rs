//! Gateway signal codes
//!
//! The `s` field of every frame exchanged with the gateway.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway signal codes
///
/// Signals define the type of frame sent or received over the WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Signal {
    /// Chat or notification message (server only)
    Message = 0,
    /// Handshake result sent right after connecting (server only)
    Hello = 1,
    /// Heartbeat ping carrying the last sequence number (client only)
    Ping = 2,
    /// Heartbeat acknowledgment (server only)
    Pong = 3,
    /// Resume request (client only)
    Resume = 4,
    /// Server demands a fresh reconnect (server only)
    Reconnect = 5,
    /// Resume acknowledged (server only)
    ResumeAck = 6,
}

impl Signal {
    /// Create a `Signal` from a raw integer value
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Message),
            1 => Some(Self::Hello),
            2 => Some(Self::Ping),
            3 => Some(Self::Pong),
            4 => Some(Self::Resume),
            5 => Some(Self::Reconnect),
            6 => Some(Self::ResumeAck),
            _ => None,
        }
    }

    /// Get the raw integer value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this signal is sent by the client
    #[must_use]
    pub const fn is_client_signal(self) -> bool {
        matches!(self, Self::Ping | Self::Resume)
    }

    /// Get the name of this signal
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Message => "Message",
            Self::Hello => "Hello",
            Self::Ping => "Ping",
            Self::Pong => "Pong",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::ResumeAck => "ResumeAck",
        }
    }
}

impl Serialize for Signal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid signal: {value}")))
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}
