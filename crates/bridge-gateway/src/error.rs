//! Gateway error types

use bridge_common::PlatformError;
use thiserror::Error;

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Discovery call failed
    #[error("Gateway discovery failed: {0}")]
    Discovery(#[from] PlatformError),

    /// Discovery succeeded but returned no endpoint
    #[error("Gateway discovery returned no url")]
    MissingGatewayUrl,

    /// Endpoint could not be parsed
    #[error("Invalid gateway url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
