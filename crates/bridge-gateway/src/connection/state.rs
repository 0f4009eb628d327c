//! Connection state

use serde::{Deserialize, Serialize};

/// Lifecycle of the single gateway transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport; a connection attempt follows
    #[default]
    Disconnected,
    /// Resolving the endpoint or opening the transport
    Connecting,
    /// Transport open, frames flowing
    Open,
    /// Close frame seen, waiting for the transport to finish
    Closing,
}

impl ConnectionState {
    /// Check if frames can be sent
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Closing => "Closing",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
