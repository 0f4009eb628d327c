//! Delivery error types

use thiserror::Error;

/// Terminal failure of one outbound message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The API rejected the payload with a code that retrying cannot fix
    #[error("Rejected by the API with code {code}: {message}")]
    Rejected { code: i64, message: String },

    /// Content too long and no repair is possible
    #[error("Content too long ({chars} characters) and cannot be shortened further")]
    ContentTooLong { chars: usize },

    /// Transient failures exceeded the retry ceiling
    #[error("Gave up after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    /// The message could not be serialized
    #[error("Failed to encode message: {0}")]
    Encode(String),

    /// The queue worker is gone
    #[error("Delivery queue closed")]
    QueueClosed,
}

impl DeliveryError {
    /// Get the API code behind the failure, if any
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Delivery result type
pub type DeliveryResult<T> = Result<T, DeliveryError>;
