//! # bridge-gateway
//!
//! Long-lived WebSocket client for the platform gateway: frame codec, durable
//! session, heartbeat scheduling, handshake/resume/reconnect, and dispatch of
//! application frames to a message handler.

pub mod client;
pub mod connection;
pub mod error;
pub mod events;
pub mod handlers;
pub mod protocol;

pub use client::{GatewayClient, GatewayHandle, GatewayStatus};
pub use error::{GatewayError, GatewayResult};
