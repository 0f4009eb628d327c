//! Configuration structs

mod app_config;

pub use app_config::{
    AppSettings, BridgeConfig, ConfigError, DeliveryConfig, Environment, GatewayConfig,
    PlatformConfig, RelayConfig,
};
