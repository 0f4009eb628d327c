//! # bridge-common
//!
//! Shared utilities including configuration, error handling, telemetry, and
//! the HTTP client for the target platform's API.

pub mod config;
pub mod error;
pub mod platform;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, BridgeConfig, ConfigError, DeliveryConfig, Environment, GatewayConfig,
    PlatformConfig, RelayConfig,
};
pub use error::{AppError, AppResult};
pub use platform::{ApiResponse, PlatformClient, PlatformError};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
